use std::collections::HashMap;
use std::fmt;

/// Identifier of a shader in a [`ShaderRegistry`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ShaderId(pub u32);

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of one registered shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Human-readable name used in diagnostics.
    pub name: String,
    /// Fragment stage source, in the dialect the graphics context compiles.
    pub fragment: String,
}

/// Synchronous lookup of shader sources by id.
pub trait ShaderRegistry {
    fn get(&self, id: ShaderId) -> Option<&ShaderSource>;

    fn exists(&self, id: ShaderId) -> bool {
        self.get(id).is_some()
    }
}

/// In-memory registry handing out sequential ids.
#[derive(Debug, Default, Clone)]
pub struct Shaders {
    entries: HashMap<ShaderId, ShaderSource>,
    next_id: u32,
}

impl Shaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shader and returns its new id.
    pub fn create(&mut self, name: impl Into<String>, fragment: impl Into<String>) -> ShaderId {
        let id = ShaderId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(
            id,
            ShaderSource {
                name: name.into(),
                fragment: fragment.into(),
            },
        );
        id
    }

    /// Removes a shader. Surfaces that already compiled it keep their program
    /// until it drops out of their tree.
    pub fn remove(&mut self, id: ShaderId) -> Option<ShaderSource> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ShaderRegistry for Shaders {
    fn get(&self, id: ShaderId) -> Option<&ShaderSource> {
        self.entries.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_hands_out_distinct_ids() {
        let mut shaders = Shaders::new();
        let a = shaders.create("a", "src a");
        let b = shaders.create("b", "src b");
        assert_ne!(a, b);
        assert_eq!(shaders.get(b).map(|s| s.name.as_str()), Some("b"));
    }

    #[test]
    fn removed_shader_no_longer_exists() {
        let mut shaders = Shaders::new();
        let id = shaders.create("gone", "");
        assert!(shaders.exists(id));
        shaders.remove(id);
        assert!(!shaders.exists(id));
    }
}
