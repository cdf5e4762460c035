//! The compute program contract: which WGSL module and entry point runs,
//! and how the dispatch grid is tiled.
//!
//! Binding scheme (group 0), fixed for every program:
//!   - `@binding(0)` input  `texture_2d<f32>`
//!   - `@binding(1)` output `texture_storage_2d<rgba8unorm, write>`
//!   - `@binding(2)` glyph atlas `texture_2d<f32>` (r8unorm)
//!   - `@binding(3)` `var<uniform>` [`crate::uniforms::EffectUniforms`]
//!
//! Programs spell their workgroup size as `WORKGROUP_X` / `WORKGROUP_Y`;
//! both are substituted from device limits before compilation.

pub const INPUT_BINDING: u32 = 0;
pub const OUTPUT_BINDING: u32 = 1;
pub const ATLAS_BINDING: u32 = 2;
pub const PARAMS_BINDING: u32 = 3;

pub const EFFECTS_ENTRY_POINT: &str = "retro_effects";
pub const PASSTHROUGH_ENTRY_POINT: &str = "passthrough";

const EFFECTS_WGSL: &str = include_str!("../shaders/wgsl/effects.wgsl");
const PASSTHROUGH_WGSL: &str = include_str!("../shaders/wgsl/passthrough.wgsl");

/// Preferred row width of a workgroup, the closest wgpu analogue to a
/// SIMD execution width.
const PREFERRED_WIDTH: u32 = 16;

#[derive(Debug, Clone)]
pub struct ComputeProgram {
    pub label: String,
    pub source: String,
    pub entry_point: String,
}

impl ComputeProgram {
    /// The retro effects program shipped with the crate.
    pub fn effects() -> Self {
        Self {
            label: "retro-effects".to_owned(),
            source: EFFECTS_WGSL.to_owned(),
            entry_point: EFFECTS_ENTRY_POINT.to_owned(),
        }
    }

    /// Copies input to output unchanged. Used to check orientation and
    /// determinism of the orchestration layer on its own.
    pub fn passthrough() -> Self {
        Self {
            label: "passthrough".to_owned(),
            source: PASSTHROUGH_WGSL.to_owned(),
            entry_point: PASSTHROUGH_ENTRY_POINT.to_owned(),
        }
    }

    pub fn specialize(&self, workgroup: WorkgroupSize) -> String {
        self.source
            .replace("WORKGROUP_X", &workgroup.x.to_string())
            .replace("WORKGROUP_Y", &workgroup.y.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Width first, then as many rows as the invocation budget allows.
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        let x = PREFERRED_WIDTH
            .min(limits.max_compute_workgroup_size_x)
            .min(limits.max_compute_invocations_per_workgroup)
            .max(1);
        let y = (limits.max_compute_invocations_per_workgroup / x)
            .min(limits.max_compute_workgroup_size_y)
            .min(PREFERRED_WIDTH)
            .max(1);
        Self { x, y }
    }

    pub fn invocations(self) -> u32 {
        self.x * self.y
    }

    /// Workgroup counts covering a `width` x `height` image. Invocations
    /// past the edge exit early in the program, so every pixel is written
    /// exactly once.
    pub fn grid_for(self, width: u32, height: u32) -> (u32, u32) {
        ((width + self.x - 1) / self.x, (height + self.y - 1) / self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_give_16_by_16() {
        let size = WorkgroupSize::from_limits(&wgpu::Limits::default());
        assert_eq!(size, WorkgroupSize { x: 16, y: 16 });
    }

    #[test]
    fn downlevel_limits_stay_within_budget() {
        let mut limits = wgpu::Limits::downlevel_defaults();
        limits.max_compute_invocations_per_workgroup = 64;
        let size = WorkgroupSize::from_limits(&limits);
        assert!(size.invocations() <= 64);
        assert_eq!(size.x, 16);
        assert_eq!(size.y, 4);
    }

    #[test]
    fn grid_covers_every_pixel_exactly_once() {
        let size = WorkgroupSize { x: 16, y: 4 };
        for (w, h) in [(1, 1), (16, 4), (17, 5), (640, 481)] {
            let (gx, gy) = size.grid_for(w, h);
            assert!(gx * size.x >= w && gy * size.y >= h);
            // One fewer group in either axis would leave pixels uncovered.
            assert!((gx - 1) * size.x < w && (gy - 1) * size.y < h);
        }
    }

    #[test]
    fn specialize_substitutes_workgroup_tokens() {
        let program = ComputeProgram::passthrough();
        let source = program.specialize(WorkgroupSize { x: 8, y: 32 });
        assert!(source.contains("@workgroup_size(8, 32, 1)"));
        assert!(!source.contains("WORKGROUP_X"));
    }

    #[test]
    fn shipped_programs_declare_contract_bindings() {
        for program in [ComputeProgram::effects(), ComputeProgram::passthrough()] {
            assert!(program.source.contains(&format!("fn {}", program.entry_point)));
            for binding in [INPUT_BINDING, OUTPUT_BINDING, ATLAS_BINDING, PARAMS_BINDING] {
                assert!(
                    program.source.contains(&format!("@binding({binding})")),
                    "{} is missing binding {binding}",
                    program.label
                );
            }
        }
    }

    #[test]
    fn effects_program_declares_every_uniform_field() {
        let source = ComputeProgram::effects().source;
        for field in [
            "mode: i32",
            "matrix_size: i32",
            "image_size: vec2<f32>",
            "color_dark: vec4<f32>",
            "halftone_misprint: f32",
            "atlas_cell: i32",
        ] {
            assert!(source.contains(field), "missing `{field}`");
        }
    }

    #[test]
    fn limited_palette_uses_the_host_cube_levels() {
        let source = ComputeProgram::effects().source;
        let levels = crate::palette::CUBE_LEVELS
            .map(|level| format!("{level}.0"))
            .join(", ");
        assert!(source.contains(&format!("array<f32, 6>({levels})")), "cube levels drifted");
        assert!(source.contains("ink = xterm256(c);"));
    }
}
