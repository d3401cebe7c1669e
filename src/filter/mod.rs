/// Record filters applied ahead of reconciliation.
///
/// Submodules:
/// - `site`: drops records from the excluded site.
/// - `blank`: drops quality-control blank samples.
///
/// Filters remove records silently (they are counted, not reported).
/// Anything that is wrong with a record rather than merely unwanted belongs
/// in the error report instead.

pub mod blank;
pub mod site;

pub use blank::BlankFilter;
pub use site::SiteFilter;
