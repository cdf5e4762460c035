//! Preset files: a [`ParameterBlock`] stored as YAML or JSON.
//!
//! Every field is optional and falls back to the default look. Loaded
//! presets are validated and clamped into the control ranges.

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::params::ParameterBlock;

pub fn load_preset(path: &Path) -> Result<ParameterBlock> {
    let contents = fs::read_to_string(path).map_err(|error| {
        PipelineError::InvalidParameters(format!("failed to read preset {}: {error}", path.display()))
    })?;
    parse_preset(&contents, is_json(path)).map_err(|reason| {
        PipelineError::InvalidParameters(format!("{}: {reason}", path.display()))
    })
}

/// Parse preset text. `json` selects the JSON reader; YAML otherwise.
pub fn parse_preset(contents: &str, json: bool) -> std::result::Result<ParameterBlock, String> {
    let params: ParameterBlock = if json {
        serde_json::from_str(contents).map_err(|error| {
            format!(
                "failed to parse json at line {}, column {}: {error}",
                error.line(),
                error.column()
            )
        })?
    } else {
        serde_yaml::from_str(contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            format!("failed to parse yaml at {location}: {error}")
        })?
    };

    params.validate().map_err(|error| error.to_string())?;
    Ok(params.clamped())
}

pub fn to_yaml(params: &ParameterBlock) -> Result<String> {
    serde_yaml::to_string(params)
        .map_err(|error| PipelineError::InvalidParameters(format!("failed to encode preset: {error}")))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::params::{DitherMatrix, Effect, EffectKind};

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_preset_is_the_default_look() {
        let file = write_temp(".yaml", "{}\n");
        let params = load_preset(file.path()).unwrap();
        assert_eq!(params, ParameterBlock::default().clamped());
        assert_eq!(params.kind(), EffectKind::AsciiArt);
    }

    #[test]
    fn yaml_preset_selects_mode_and_knobs() {
        let file = write_temp(
            ".yml",
            "mode:\n  kind: ordered_dither\n  matrix: x8\n  palette_steps: 4\ntone:\n  columns: 160\n  light: \"#ffb000\"\n",
        );
        let params = load_preset(file.path()).unwrap();
        assert_eq!(
            params.effect,
            Effect::OrderedDither {
                matrix: DitherMatrix::X8,
                palette_steps: 4
            }
        );
        assert_eq!(params.tone.columns, 160.0);
    }

    #[test]
    fn json_is_chosen_by_extension() {
        let file = write_temp(".json", r#"{"mode": {"kind": "halftone", "misprint": 0.5}}"#);
        let params = load_preset(file.path()).unwrap();
        assert_eq!(params.kind(), EffectKind::Halftone);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let file = write_temp(
            ".yaml",
            "mode:\n  kind: ascii_art\ntone:\n  columns: 999\nadjust:\n  contrast: 7\n",
        );
        let params = load_preset(file.path()).unwrap();
        assert_eq!(params.tone.columns, 300.0);
        assert_eq!(params.adjust.contrast, 2.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_preset("tone:\n  colums: 80\n", false).unwrap_err();
        assert!(err.contains("colums"), "{err}");
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = parse_preset("adjust:\n  brightness: .nan\n", false).unwrap_err();
        assert!(err.contains("brightness"), "{err}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_preset(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameters(_)));
    }

    #[test]
    fn yaml_round_trip_preserves_preset() {
        let params = ParameterBlock::with_effect(Effect::default_for(EffectKind::Crt));
        let text = to_yaml(&params).unwrap();
        assert_eq!(parse_preset(&text, false).unwrap(), params.clamped());
    }
}
