//! WGSL validation using the naga library.

use anyhow::{Context, Result, anyhow};

/// Parse WGSL source code with naga's frontend.
///
/// Returns the parsed module, or an error that carries the numbered source
/// listing on failure.
pub fn parse_wgsl(source: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("WGSL parse failed:\n{}", format_naga_error(source, &e.to_string())))
}

/// Parse and fully validate WGSL (types, uniformity, resource bindings).
///
/// # Example
/// ```ignore
/// let shader = builder.finish()?;
/// validate_wgsl(&shader.wgsl)?;
/// ```
pub fn validate_wgsl(source: &str) -> Result<naga::Module> {
    let module = parse_wgsl(source)?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| {
        anyhow!(
            "WGSL validation failed:\n{}",
            format_naga_error(source, &format!("{e:?}"))
        )
    })?;
    Ok(module)
}

/// Validate WGSL and name the generator in the error.
///
/// `context` describes what generated the source, e.g. `"polar sampler"`.
pub fn validate_wgsl_with_context(source: &str, context: &str) -> Result<naga::Module> {
    validate_wgsl(source).with_context(|| format!("{} generated invalid WGSL", context))
}

fn format_naga_error(source: &str, message: &str) -> String {
    let mut output = format!("  {}\n", message);

    output.push_str("\nGenerated WGSL:\n");
    output.push_str("---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");

    output
}
