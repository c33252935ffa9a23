//! Identifier and path-name helpers shared by graph building and execution.

use url::Url;

use crate::error::ExecError;

/// Extract the trailing UUID segment of an IRI (after the last `#`, or the
/// last `/` when there is no fragment).
pub fn uuid_from_iri(iri: &str) -> &str {
    if let Some((_, frag)) = iri.rsplit_once('#') {
        frag
    } else {
        iri.rsplit_once('/').map_or(iri, |(_, tail)| tail)
    }
}

/// Make a label safe as a single path component: spaces become underscores.
pub fn sanitize_label(label: &str) -> String {
    label.replace(' ', "_")
}

/// Container image tag for a plugin: lowercase, spaces become hyphens.
pub fn image_tag(plugin_label: &str) -> String {
    format!("plugin-{}", plugin_label.to_lowercase().replace(' ', "-"))
}

/// Replace the scheme and authority of `original` with those of `base`,
/// keeping path, query, and fragment.
pub fn rewrite_url_base(original: &str, base: &Url) -> Result<String, ExecError> {
    let mut url = Url::parse(original).map_err(|e| ExecError::InvalidUrl {
        url: original.to_string(),
        message: e.to_string(),
    })?;

    let invalid = |message: &str| ExecError::InvalidUrl {
        url: base.as_str().to_string(),
        message: message.to_string(),
    };

    url.set_scheme(base.scheme())
        .map_err(|()| invalid("cannot apply scheme"))?;
    url.set_host(base.host_str())
        .map_err(|e| invalid(&e.to_string()))?;
    url.set_port(base.port())
        .map_err(|()| invalid("cannot apply port"))?;

    Ok(url.into())
}

/// Basename of an access URL, used as the local download file name.
pub fn url_basename(url: &str) -> String {
    let trimmed = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    trimmed
        .rsplit_once('/')
        .map_or(trimmed, |(_, tail)| tail)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_from_fragment_iri() {
        assert_eq!(
            uuid_from_iri("http://example.com/ns/ds#my-uuid-123"),
            "my-uuid-123"
        );
    }

    #[test]
    fn uuid_from_path_iri() {
        assert_eq!(
            uuid_from_iri("http://example.com/ns/pl/another-uuid-456"),
            "another-uuid-456"
        );
    }

    #[test]
    fn sanitize_replaces_spaces() {
        assert_eq!(sanitize_label("Input Data"), "Input_Data");
    }

    #[test]
    fn image_tag_is_kebab() {
        assert_eq!(image_tag("Sample Plugin"), "plugin-sample-plugin");
    }

    #[test]
    fn rewrite_keeps_path_query_fragment() {
        let base = Url::parse("https://mirror:9443").unwrap();
        let rewritten =
            rewrite_url_base("http://repo:8081/api/v1/objects/a1?rev=2#frag", &base).unwrap();
        assert_eq!(rewritten, "https://mirror:9443/api/v1/objects/a1?rev=2#frag");
    }

    #[test]
    fn rewrite_drops_explicit_port_when_base_has_none() {
        let base = Url::parse("http://mirror").unwrap();
        let rewritten = rewrite_url_base("http://repo:8081/objects/a1", &base).unwrap();
        assert_eq!(rewritten, "http://mirror/objects/a1");
    }

    #[test]
    fn basename_ignores_query() {
        assert_eq!(url_basename("http://repo/api/objects/d.zip?x=1"), "d.zip");
    }

    #[test]
    fn basename_of_bare_url() {
        assert_eq!(url_basename("http://repo"), "repo");
    }
}
