use super::StageKind;
use super::diagnostic::Diagnostic;
use super::interface::{ProgramInterface, StageInterface, VertexLayout};

/// Checks that a vertex/fragment pair can run as one program and resolves
/// what the program reads.
///
/// Fails when a stage sits in the wrong slot, when the fragment stage reads a
/// varying the vertex stage never writes (or writes with another type), or
/// when the vertex stage consumes an attribute the vertex layout lacks.
///
/// Varyings are matched on location and type only. Interpolation qualifiers
/// are not compared: the fragment input's qualifier decides how a varying is
/// interpolated, as GLSL 4.50 and Vulkan interface matching both allow.
pub fn link_interfaces(
    vertex: (StageKind, &StageInterface),
    fragment: (StageKind, &StageInterface),
    layout: Option<&VertexLayout>,
) -> Result<ProgramInterface, Diagnostic> {
    let (vertex_kind, vertex) = vertex;
    let (fragment_kind, fragment) = fragment;

    if vertex_kind != StageKind::Vertex {
        return Err(Diagnostic::new(format!(
            "vertex slot holds a {} stage",
            vertex_kind.name()
        )));
    }
    if fragment_kind != StageKind::Fragment {
        return Err(Diagnostic::new(format!(
            "fragment slot holds a {} stage",
            fragment_kind.name()
        )));
    }

    let mut problems = Vec::new();
    let mut varyings = Vec::with_capacity(fragment.inputs.len());

    for input in &fragment.inputs {
        match vertex.output(input.location) {
            Some(output) if output.ty == input.ty => varyings.push(output.clone()),
            Some(output) => problems.push(format!(
                "fragment input {} does not match vertex output {}",
                input, output
            )),
            None => problems.push(format!(
                "fragment input {} is not written by the vertex stage",
                input
            )),
        }
    }

    let mut vertex_attributes = Vec::new();
    if let Some(layout) = layout {
        for input in &vertex.inputs {
            match layout.attribute(input.location) {
                Some(attribute) if attribute.format.interface_type() == input.ty => {
                    vertex_attributes.push(*attribute)
                }
                Some(attribute) => problems.push(format!(
                    "vertex input {} does not match buffer attribute {:?} at location {}",
                    input, attribute.format, attribute.location
                )),
                None => problems.push(format!(
                    "vertex input {} is not supplied by the vertex buffer layout",
                    input
                )),
            }
        }
    }

    if !problems.is_empty() {
        return Err(Diagnostic::new(problems.join("\n")));
    }

    Ok(ProgramInterface {
        vertex_stride: layout.map(|layout| layout.stride),
        vertex_attributes,
        varyings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::interface::{
        AttributeFormat, InterfaceType, InterfaceVariable, VertexAttribute,
    };

    fn variable(location: u32, name: &str, ty: InterfaceType) -> InterfaceVariable {
        InterfaceVariable {
            location,
            name: Some(name.to_owned()),
            ty,
        }
    }

    fn position_layout() -> VertexLayout {
        VertexLayout {
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                format: AttributeFormat::Float3,
                offset: 0,
            }],
        }
    }

    #[test]
    fn matching_varyings_link() {
        let vertex = StageInterface {
            inputs: vec![variable(0, "a_position", InterfaceType::VEC3)],
            outputs: vec![
                variable(0, "v_color", InterfaceType::VEC3),
                variable(1, "v_unused", InterfaceType::FLOAT),
            ],
        };
        let fragment = StageInterface {
            inputs: vec![variable(0, "v_color", InterfaceType::VEC3)],
            outputs: vec![variable(0, "out_color", InterfaceType::VEC4)],
        };

        let interface = link_interfaces(
            (StageKind::Vertex, &vertex),
            (StageKind::Fragment, &fragment),
            Some(&position_layout()),
        )
        .unwrap();

        assert_eq!(interface.vertex_stride, Some(12));
        assert_eq!(interface.vertex_attributes.len(), 1);
        assert_eq!(interface.varyings, vec![variable(0, "v_color", InterfaceType::VEC3)]);
    }

    #[test]
    fn swapped_stages_fail() {
        let empty = StageInterface::default();
        let diagnostic = link_interfaces(
            (StageKind::Vertex, &empty),
            (StageKind::Vertex, &empty),
            None,
        )
        .unwrap_err();
        assert!(diagnostic.text().contains("fragment slot holds a vertex stage"));
    }

    #[test]
    fn missing_and_mistyped_varyings_are_all_reported() {
        let vertex = StageInterface {
            inputs: vec![],
            outputs: vec![variable(0, "v_uv", InterfaceType::VEC2)],
        };
        let fragment = StageInterface {
            inputs: vec![
                variable(0, "v_uv", InterfaceType::VEC3),
                variable(2, "v_normal", InterfaceType::VEC3),
            ],
            outputs: vec![],
        };

        let diagnostic = link_interfaces(
            (StageKind::Vertex, &vertex),
            (StageKind::Fragment, &fragment),
            None,
        )
        .unwrap_err();

        assert!(diagnostic.text().contains("does not match"));
        assert!(diagnostic.text().contains("`v_normal`"));
    }

    #[test]
    fn attribute_missing_from_layout_fails() {
        let vertex = StageInterface {
            inputs: vec![
                variable(0, "a_position", InterfaceType::VEC3),
                variable(1, "a_color", InterfaceType::VEC3),
            ],
            outputs: vec![],
        };

        let diagnostic = link_interfaces(
            (StageKind::Vertex, &vertex),
            (StageKind::Fragment, &StageInterface::default()),
            Some(&position_layout()),
        )
        .unwrap_err();

        assert!(diagnostic.text().contains("`a_color`"));
        assert!(diagnostic.text().contains("not supplied"));
    }

    #[test]
    fn attribute_with_the_wrong_format_fails() {
        let vertex = StageInterface {
            inputs: vec![variable(0, "a_position", InterfaceType::VEC3)],
            outputs: vec![],
        };
        let layout = VertexLayout {
            stride: 8,
            attributes: vec![VertexAttribute {
                location: 0,
                format: AttributeFormat::Float2,
                offset: 0,
            }],
        };

        let diagnostic = link_interfaces(
            (StageKind::Vertex, &vertex),
            (StageKind::Fragment, &StageInterface::default()),
            Some(&layout),
        )
        .unwrap_err();

        assert!(diagnostic.text().contains("`a_position`"));
        assert!(diagnostic.text().contains("Float2"));
    }

    #[test]
    fn without_a_layout_vertex_inputs_are_not_checked() {
        let vertex = StageInterface {
            inputs: vec![variable(3, "a_anything", InterfaceType::VEC4)],
            outputs: vec![],
        };

        let interface = link_interfaces(
            (StageKind::Vertex, &vertex),
            (StageKind::Fragment, &StageInterface::default()),
            None,
        )
        .unwrap();

        assert_eq!(interface.vertex_stride, None);
        assert!(interface.vertex_attributes.is_empty());
    }
}
