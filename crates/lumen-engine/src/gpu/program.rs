/// Well-known uniform parameters bound by render objects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Semantic {
    World,
    ViewProjection,
    ObjectColor,
    UvScroll,
}

impl Semantic {
    /// Matches a uniform global name, ignoring case and underscores
    /// (`view_projection`, `viewProjection` and `VIEWPROJECTION` all match).
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match key.as_str() {
            "WORLD" => Some(Self::World),
            "VIEWPROJECTION" => Some(Self::ViewProjection),
            "OBJCOLOR" => Some(Self::ObjectColor),
            "UVSCROLL" => Some(Self::UvScroll),
            _ => None,
        }
    }
}

/// A `var<uniform>` in bind group 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub binding: u32,
    pub name: String,
    pub size: u64,
    pub semantic: Option<Semantic>,
}

/// One draw of a technique: a vertex + fragment entry point pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub vertex_entry: String,
    pub fragment_entry: String,
}

/// Named group of passes drawn in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    pub name: String,
    pub passes: Vec<Pass>,
}

/// Reflected interface of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub uniforms: Vec<UniformSlot>,
    pub texture_binding: Option<u32>,
    pub sampler_binding: Option<u32>,
    pub techniques: Vec<Technique>,
}

impl ProgramLayout {
    pub fn uniform_for(&self, semantic: Semantic) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.semantic == Some(semantic))
    }

    pub fn technique_index(&self, name: &str) -> Option<usize> {
        self.techniques.iter().position(|t| t.name == name)
    }
}

/// Validated WGSL plus its layout, ready for [`RenderBackend::create_program`].
///
/// [`RenderBackend::create_program`]: super::RenderBackend::create_program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: String,
    pub wgsl: String,
    pub layout: ProgramLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_names_ignore_case_and_underscores() {
        assert_eq!(Semantic::from_name("world"), Some(Semantic::World));
        assert_eq!(Semantic::from_name("view_projection"), Some(Semantic::ViewProjection));
        assert_eq!(Semantic::from_name("ViewProjection"), Some(Semantic::ViewProjection));
        assert_eq!(Semantic::from_name("obj_color"), Some(Semantic::ObjectColor));
        assert_eq!(Semantic::from_name("UV_SCROLL"), Some(Semantic::UvScroll));
        assert_eq!(Semantic::from_name("tint"), None);
    }
}
