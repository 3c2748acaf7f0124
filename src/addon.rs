//! Node-addon surface, compiled only with the `napi` feature.

use napi_derive::napi;

use crate::api::{self, OutputOptions, TranspileOptions};
use crate::wrappers::Format;

#[napi(object)]
#[derive(Default)]
pub struct AddonOptions {
    pub format: String,
    pub strict: Option<bool>,
    pub name: Option<String>,
    pub amd_name: Option<String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
}

#[napi(object)]
pub struct AddonOutput {
    pub code: String,
    pub map: Option<String>,
}

#[napi]
pub fn transpile_module(source: String, options: AddonOptions) -> napi::Result<AddonOutput> {
    let format = match options.format.as_str() {
        "amd" => Format::Amd,
        "umd" => Format::Umd,
        _ => Format::Cjs,
    };
    let mut transpile_options = TranspileOptions::new(format);
    transpile_options.output = OutputOptions {
        strict: options.strict.unwrap_or(false),
        name: options.name,
        amd_name: options.amd_name,
        banner: options.banner,
        footer: options.footer,
        ..OutputOptions::default()
    };
    let output = api::transpile(&source, &transpile_options)
        .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))?;
    Ok(AddonOutput {
        code: output.code,
        map: output.map.map(|m| m.to_json()),
    })
}
