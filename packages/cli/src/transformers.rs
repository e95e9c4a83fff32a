// Built-in Transformers
//
// A small set of demo transformers so the CLI can exercise pipelines
// without external plugins. Real plugin loading belongs to the outer
// configuration layer, not this binary.

use quarry_core::diagnostics::DiagnosticError;
use quarry_core::plugin::{Transformer, TransformerOutput};
use std::sync::Arc;

/// Look up a built-in transformer by the name used in the pipeline map.
pub fn built_in(name: &str) -> Option<Arc<Transformer>> {
    match name {
        "passthrough" => Some(passthrough()),
        "json-to-js" => Some(json_to_js()),
        "ts-to-js" => Some(ts_to_js()),
        "js-minify" => Some(js_minify()),
        _ => None,
    }
}

/// Returns its input unchanged.
fn passthrough() -> Arc<Transformer> {
    Arc::new(Transformer::from_transform(Box::new(|_input| {
        Ok(vec![TransformerOutput::Input])
    })))
}

/// Wraps a JSON document into a CommonJS module, switching the asset type
/// to `js` so the js pipeline picks it up.
fn json_to_js() -> Arc<Transformer> {
    Arc::new(Transformer::from_transform(Box::new(|mut input| {
        let source = input.asset.content_string().into_owned();
        let value: serde_json::Value = serde_json::from_str(&source).map_err(|err| {
            DiagnosticError::new("json-to-js", format!("Invalid JSON: {}", err))
        })?;
        input.asset.set_type("js");
        input
            .asset
            .set_content(format!("module.exports = {};", value).into_bytes());
        Ok(vec![TransformerOutput::Input])
    })))
}

/// Marks a TypeScript asset as JavaScript. Type information is simply
/// dropped; this exists to demonstrate pipeline chaining, not to compile.
fn ts_to_js() -> Arc<Transformer> {
    Arc::new(Transformer::from_transform(Box::new(|mut input| {
        input.asset.set_type("js");
        Ok(vec![TransformerOutput::Input])
    })))
}

/// Strips blank lines and line comments.
fn js_minify() -> Arc<Transformer> {
    Arc::new(Transformer::from_transform(Box::new(|mut input| {
        let source = input.asset.content_string().into_owned();
        let minified: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .collect();
        input.asset.set_content(minified.join("\n").into_bytes());
        Ok(vec![TransformerOutput::Input])
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_know_all_configured_names() {
        for name in ["passthrough", "json-to-js", "ts-to-js", "js-minify"] {
            assert!(built_in(name).is_some(), "missing built-in: {}", name);
        }
        assert!(built_in("unknown").is_none());
    }
}
