//! WGSL validation and interface reflection.
//!
//! Programs are plain WGSL. Their interface is read from the module instead of
//! being declared separately:
//! - techniques come from entry point names: `vs_<technique>` / `fs_<technique>` for a
//!   single pass, `vs_<technique>_<n>` / `fs_<technique>_<n>` for pass `n`
//! - semantic parameters are `var<uniform>` globals named after the semantic
//! - the first `texture_2d` and the first `sampler` global are the material bindings
//!
//! Only bind group 0 is supported.

use std::collections::BTreeMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::gpu::{Pass, ProgramLayout, ProgramSource, Semantic, Technique, UniformSlot};

/// Parses, validates and reflects `wgsl`. The error is a human-readable diagnostic.
pub fn reflect_program(label: &str, wgsl: &str) -> Result<ProgramSource, String> {
    let module = naga::front::wgsl::parse_str(wgsl).map_err(|e| e.emit_to_string(wgsl))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| e.emit_to_string(wgsl))?;

    let mut layouter = naga::proc::Layouter::default();
    layouter
        .update(module.to_ctx())
        .map_err(|e| format!("type layout failed: {e}"))?;

    let mut layout = ProgramLayout::default();

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else { continue };
        if binding.group != 0 {
            return Err(format!(
                "global `{}` uses bind group {}; only group 0 is supported",
                global.name.as_deref().unwrap_or("<unnamed>"),
                binding.group
            ));
        }

        match global.space {
            naga::AddressSpace::Uniform => {
                let name = global.name.clone().unwrap_or_default();
                layout.uniforms.push(UniformSlot {
                    binding: binding.binding,
                    semantic: Semantic::from_name(&name),
                    size: u64::from(layouter[global.ty].size),
                    name,
                });
            }
            naga::AddressSpace::Handle => match module.types[global.ty].inner {
                naga::TypeInner::Image { .. } if layout.texture_binding.is_none() => {
                    layout.texture_binding = Some(binding.binding);
                }
                naga::TypeInner::Sampler { .. } if layout.sampler_binding.is_none() => {
                    layout.sampler_binding = Some(binding.binding);
                }
                _ => {}
            },
            _ => {}
        }
    }

    layout.techniques = techniques(&module)?;
    if layout.techniques.is_empty() {
        return Err("no technique found (expected `vs_<name>` / `fs_<name>` entry points)".into());
    }

    Ok(ProgramSource {
        label: label.to_string(),
        wgsl: wgsl.to_string(),
        layout,
    })
}

/// `vs_render_1` -> ("render", 1); `vs_render` -> ("render", 0).
fn split_entry(name: &str, prefix: &str) -> Option<(String, usize)> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    if let Some((technique, pass)) = rest.rsplit_once('_') {
        if !technique.is_empty() {
            if let Ok(pass) = pass.parse::<usize>() {
                return Some((technique.to_string(), pass));
            }
        }
    }
    Some((rest.to_string(), 0))
}

fn techniques(module: &naga::Module) -> Result<Vec<Technique>, String> {
    let mut fragment_entries = Vec::new();
    // Technique order follows the first vertex entry point of each technique.
    let mut order: Vec<String> = Vec::new();
    let mut passes: BTreeMap<(String, usize), String> = BTreeMap::new();

    for entry in &module.entry_points {
        match entry.stage {
            naga::ShaderStage::Vertex => {
                if let Some((technique, pass)) = split_entry(&entry.name, "vs_") {
                    if !order.contains(&technique) {
                        order.push(technique.clone());
                    }
                    passes.insert((technique, pass), entry.name.clone());
                }
            }
            naga::ShaderStage::Fragment => fragment_entries.push(entry.name.clone()),
            _ => {}
        }
    }

    order
        .into_iter()
        .map(|name| {
            let passes = passes
                .iter()
                .filter(|((technique, _), _)| *technique == name)
                .map(|(_, vertex_entry)| {
                    let fragment_entry = format!("fs_{}", &vertex_entry[3..]);
                    if !fragment_entries.contains(&fragment_entry) {
                        return Err(format!(
                            "technique `{name}`: vertex entry `{vertex_entry}` has no `{fragment_entry}`"
                        ));
                    }
                    Ok(Pass {
                        vertex_entry: vertex_entry.clone(),
                        fragment_entry,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Technique { name, passes })
        })
        .collect()
}
