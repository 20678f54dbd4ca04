//! Decoding of the checklist form posted back from the HTML preview.

/// Input names for field values carry this prefix: `field:<name>`.
pub const FIELD_PREFIX: &str = "field:";

/// Field edits from an `application/x-www-form-urlencoded` body, in posted
/// order. Inputs without the field prefix are ignored.
pub fn parse_edits(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .filter_map(|(key, value)| {
            key.strip_prefix(FIELD_PREFIX)
                .map(|name| (name.to_string(), value.into_owned()))
        })
        .collect()
}

/// Form input name for a field.
pub fn input_name(field: &str) -> String {
    format!("{FIELD_PREFIX}{field}")
}
