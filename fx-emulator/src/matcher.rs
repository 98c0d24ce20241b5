use std::collections::HashMap;

/// Strips leading and trailing slashes and collapses runs of slashes: `"///a////b//c/"` -> `"a/b/c"`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Matches `concrete_path` against a `{param}` template and returns the captured segments.
///
/// An empty map means no match. A concrete segment that is itself an un-instantiated wildcard
/// (`{still_wild}`) matches a template wildcard but is not captured.
pub fn extract_params(template: &str, concrete_path: &str) -> HashMap<String, String> {
    let template = normalize_path(template);
    let concrete_path = normalize_path(concrete_path);
    let template_segments: Vec<&str> = template.split('/').collect();
    let concrete_segments: Vec<&str> = concrete_path.split('/').collect();

    if template_segments.len() != concrete_segments.len() {
        return HashMap::new();
    }

    let mut params = HashMap::new();
    for (template_segment, concrete_segment) in template_segments.into_iter().zip(concrete_segments) {
        match wildcard_name(template_segment) {
            Some(name) => {
                if wildcard_name(concrete_segment).is_none() {
                    params.insert(name.to_owned(), concrete_segment.to_owned());
                }
            },
            None => {
                if template_segment != concrete_segment {
                    return HashMap::new();
                }
            },
        }
    }

    params
}

/// Structural half of [`extract_params`]: same segment count and equal literal segments.
pub fn is_valid_match(template: &str, concrete_path: &str) -> bool {
    let template = normalize_path(template);
    let concrete_path = normalize_path(concrete_path);
    let template_segments: Vec<&str> = template.split('/').collect();
    let concrete_segments: Vec<&str> = concrete_path.split('/').collect();

    template_segments.len() == concrete_segments.len()
        && template_segments.iter()
            .zip(concrete_segments.iter())
            .all(|(template_segment, concrete_segment)| {
                wildcard_name(template_segment).is_some() || template_segment == concrete_segment
            })
}

fn wildcard_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}
