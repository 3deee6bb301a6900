//! `{placeholder}` substitution for download URL templates.

use std::collections::HashMap;

use crate::config::PackageConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown placeholder {{{name}}} in template {template:?}")]
    UnknownPlaceholder { name: String, template: String },
    #[error("unterminated placeholder in template {0:?}")]
    Unterminated(String),
    #[error("rendered URL {url:?} is not a valid absolute URL: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Replace each `{key}` in `template` with `args[key]`.
pub fn format_template(
    template: &str,
    args: &HashMap<&str, &str>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
        let name = &after[..close];
        let value = args
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder {
                name: name.to_string(),
                template: template.to_string(),
            })?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Source archive URL for `version` of `package`.
pub fn download_url(package: &PackageConfig, version: &str) -> Result<String, TemplateError> {
    let args = HashMap::from([
        ("host", package.host.as_str()),
        ("owner", package.owner.as_str()),
        ("repo", package.repo.as_str()),
        ("version", version),
    ]);
    let rendered = format_template(&package.url_template, &args)?;
    url::Url::parse(&rendered).map_err(|e| TemplateError::InvalidUrl {
        url: rendered.clone(),
        reason: e.to_string(),
    })?;
    Ok(rendered)
}
