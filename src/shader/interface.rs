use std::fmt;

use naga::{Binding, Handle, Module, ScalarKind, Type, TypeInner};

/// Component type of a `location`-bound stage variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Float,
    Sint,
    Uint,
    Bool,
}

/// Shape of a `location`-bound stage variable.
///
/// Only 32-bit scalars and vectors can cross the vertex/fragment boundary in
/// this demo; everything else is kept as its debug spelling so that two
/// stages declaring the same exotic type still compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterfaceType {
    Vector { kind: ComponentKind, components: u8 },
    Unsupported(String),
}

impl InterfaceType {
    pub const FLOAT: Self = Self::Vector {
        kind: ComponentKind::Float,
        components: 1,
    };
    pub const VEC2: Self = Self::Vector {
        kind: ComponentKind::Float,
        components: 2,
    };
    pub const VEC3: Self = Self::Vector {
        kind: ComponentKind::Float,
        components: 3,
    };
    pub const VEC4: Self = Self::Vector {
        kind: ComponentKind::Float,
        components: 4,
    };

    fn from_naga(inner: &TypeInner) -> Self {
        let (scalar, components) = match *inner {
            TypeInner::Scalar(scalar) => (scalar, 1),
            TypeInner::Vector { size, scalar } => (scalar, size as u8),
            ref other => return Self::Unsupported(format!("{:?}", other)),
        };

        let kind = match scalar.kind {
            ScalarKind::Float if scalar.width == 4 => ComponentKind::Float,
            ScalarKind::Sint if scalar.width == 4 => ComponentKind::Sint,
            ScalarKind::Uint if scalar.width == 4 => ComponentKind::Uint,
            ScalarKind::Bool => ComponentKind::Bool,
            _ => return Self::Unsupported(format!("{:?}", inner)),
        };

        Self::Vector { kind, components }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceType::Vector { kind, components: 1 } => f.write_str(match kind {
                ComponentKind::Float => "float",
                ComponentKind::Sint => "int",
                ComponentKind::Uint => "uint",
                ComponentKind::Bool => "bool",
            }),
            InterfaceType::Vector { kind, components } => {
                let prefix = match kind {
                    ComponentKind::Float => "",
                    ComponentKind::Sint => "i",
                    ComponentKind::Uint => "u",
                    ComponentKind::Bool => "b",
                };
                write!(f, "{}vec{}", prefix, components)
            }
            InterfaceType::Unsupported(spelling) => f.write_str(spelling),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceVariable {
    pub location: u32,
    pub name: Option<String>,
    pub ty: InterfaceType,
}

impl fmt::Display for InterfaceVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "`{}` ({} at location {})", name, self.ty, self.location),
            None => write!(f, "{} at location {}", self.ty, self.location),
        }
    }
}

/// The `location`-bound inputs and outputs of a stage's entry point.
/// Built-ins such as `gl_Position` are not part of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageInterface {
    pub inputs: Vec<InterfaceVariable>,
    pub outputs: Vec<InterfaceVariable>,
}

impl StageInterface {
    pub(crate) fn reflect(module: &Module, entry_point: &naga::EntryPoint) -> Self {
        let mut interface = Self::default();

        for argument in &entry_point.function.arguments {
            collect_locations(
                module,
                argument.name.as_deref(),
                argument.ty,
                argument.binding.as_ref(),
                &mut interface.inputs,
            );
        }
        if let Some(result) = &entry_point.function.result {
            collect_locations(
                module,
                None,
                result.ty,
                result.binding.as_ref(),
                &mut interface.outputs,
            );
        }

        interface.inputs.sort_by_key(|variable| variable.location);
        interface.outputs.sort_by_key(|variable| variable.location);
        interface
    }

    #[cfg(test)]
    pub fn input(&self, location: u32) -> Option<&InterfaceVariable> {
        self.inputs.iter().find(|variable| variable.location == location)
    }

    pub fn output(&self, location: u32) -> Option<&InterfaceVariable> {
        self.outputs.iter().find(|variable| variable.location == location)
    }
}

fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<InterfaceVariable>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(InterfaceVariable {
            location: *location,
            name: name.map(str::to_owned),
            ty: InterfaceType::from_naga(&module.types[ty].inner),
        }),
        Some(Binding::BuiltIn(_)) => {}
        // Entry points may group their varyings in a struct.
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

/// Format of one attribute inside a vertex buffer element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeFormat {
    Float,
    Float2,
    Float3,
    Float4,
}

impl AttributeFormat {
    pub fn interface_type(self) -> InterfaceType {
        match self {
            AttributeFormat::Float => InterfaceType::FLOAT,
            AttributeFormat::Float2 => InterfaceType::VEC2,
            AttributeFormat::Float3 => InterfaceType::VEC3,
            AttributeFormat::Float4 => InterfaceType::VEC4,
        }
    }

    #[cfg(test)]
    pub fn size(self) -> u32 {
        let components = match self {
            AttributeFormat::Float => 1,
            AttributeFormat::Float2 => 2,
            AttributeFormat::Float3 => 3,
            AttributeFormat::Float4 => 4,
        };
        components * size_of::<f32>() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u32,
}

/// Layout of the single interleaved vertex buffer the program will read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.location == location)
    }
}

/// What a linked program reads and passes between its stages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// Buffer stride, when a vertex layout was supplied at link time.
    pub vertex_stride: Option<u32>,
    /// Buffer attributes the vertex stage actually consumes.
    pub vertex_attributes: Vec<VertexAttribute>,
    /// Vertex outputs consumed by the fragment stage.
    pub varyings: Vec<InterfaceVariable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_print_like_glsl() {
        assert_eq!(InterfaceType::FLOAT.to_string(), "float");
        assert_eq!(InterfaceType::VEC3.to_string(), "vec3");
        let ivec2 = InterfaceType::Vector {
            kind: ComponentKind::Sint,
            components: 2,
        };
        assert_eq!(ivec2.to_string(), "ivec2");
    }

    #[test]
    fn attribute_formats_map_to_float_vectors() {
        assert_eq!(AttributeFormat::Float3.interface_type(), InterfaceType::VEC3);
        assert_eq!(AttributeFormat::Float3.size(), 12);
        assert_eq!(AttributeFormat::Float4.size(), 16);
    }

    #[test]
    fn variable_display_includes_name_and_location() {
        let variable = InterfaceVariable {
            location: 1,
            name: Some("v_color".to_owned()),
            ty: InterfaceType::VEC3,
        };
        assert_eq!(variable.to_string(), "`v_color` (vec3 at location 1)");
    }
}
