use crate::models::request_params::BarsRequestParams;

/// Builds the query string for a bars request.
///
/// The chart endpoint takes epoch seconds and uses the same interval
/// spelling as [`Interval`](crate::models::granularity::Interval).
pub fn construct_params(params: &BarsRequestParams) -> Vec<(&'static str, String)> {
    vec![
        ("period1", params.start.timestamp().to_string()),
        ("period2", params.end.timestamp().to_string()),
        ("interval", params.granularity.interval().as_str().to_string()),
        ("includePrePost", "false".to_string()),
        ("events", "div,split".to_string()),
    ]
}

/// Query for a minimal chart used only for its `meta` block.
pub fn construct_meta_params() -> Vec<(&'static str, String)> {
    vec![
        ("range", "1d".to_string()),
        ("interval", "1d".to_string()),
    ]
}
