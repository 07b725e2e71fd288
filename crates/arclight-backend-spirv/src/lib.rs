//! SPIR-V backend.
//!
//! Emits a SPIR-V 1.0 binary module from a preprocessed,
//! stage-extracted ATSL module. The emission contract: instruction
//! order encodes evaluation order, every type/constant is deduplicated,
//! buffer types carry explicit layout decorations, and constructs the
//! format cannot express fail with `Unsupported` instead of producing
//! an invalid stream.

mod inst;
pub mod typeck;
mod writer;

use arclight_ast::{Module, Stage};
use arclight_backend_core::{BackendError, BackendOptions, ShaderBackend, ShaderOutput};

pub use inst::MAGIC;

const TARGET: &str = "SPIR-V";

pub(crate) fn unsupported(reason: String) -> BackendError {
    BackendError::Unsupported {
        target: TARGET,
        reason,
    }
}

/// The SPIR-V binary backend.
#[derive(Debug)]
pub struct SpirvBackend;

impl ShaderBackend for SpirvBackend {
    fn name(&self) -> &str {
        "SPIR-V"
    }

    fn targets(&self) -> &[&str] {
        &["spirv", "spv"]
    }

    fn compile(
        &self,
        module: &Module,
        stage: Stage,
        opts: &BackendOptions,
    ) -> Result<ShaderOutput, BackendError> {
        let bytes = writer::Writer::new(module, stage, opts).write()?;
        Ok(ShaderOutput::Binary(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arclight_parser::parse;
    use arclight_preprocess::{process, OptionTable};
    use arclight_reflect::extract_stage;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn emit(source: &str, stage: Stage) -> Vec<u8> {
        let module = parse(source).unwrap();
        let module = process(&module, &OptionTable::new()).unwrap();
        let module = extract_stage(&module, stage).unwrap();
        let out = SpirvBackend
            .compile(&module, stage, &BackendOptions::default())
            .unwrap();
        out.as_binary().unwrap().to_vec()
    }

    const BASIC: &str = "\
external(set = 0, binding = 0) mat4f viewProj;
external(set = 0, binding = 1) sampler2Df colorMap;
input(vertex, location = 0) vec3f position;
input(vertex, location = 1) vec2f uv;
output(vertex, location = 0) vec2f vsUv;
input(fragment, location = 0) vec2f fsUv;
output(fragment, location = 0) vec4f color;
[vertex]
fn vsMain() {
    vsUv = uv;
    setVertexPosition(viewProj * vec4f(position, 1.0));
}
[fragment]
fn fsMain() {
    color = sample(colorMap, fsUv);
}
";

    /// Scans for an instruction with the given opcode, returning its
    /// operand words.
    fn find_inst(words: &[u32], opcode: u16) -> Option<Vec<u32>> {
        let mut i = 5; // skip the header
        while i < words.len() {
            let count = (words[i] >> 16) as usize;
            let op = (words[i] & 0xffff) as u16;
            assert!(count > 0, "zero-length instruction at {i}");
            if op == opcode {
                return Some(words[i + 1..i + count].to_vec());
            }
            i += count;
        }
        None
    }

    #[test]
    fn header_is_well_formed() {
        let bytes = emit(BASIC, Stage::Vertex);
        let words = words(&bytes);
        assert_eq!(words[0], MAGIC);
        assert_eq!(words[1], 0x0001_0000);
        assert!(words[3] > 1, "id bound must cover allocated ids");
        assert_eq!(words[4], 0);
    }

    #[test]
    fn instruction_stream_is_walkable() {
        // Every instruction's word count must land exactly at the end.
        for stage in [Stage::Vertex, Stage::Fragment] {
            let bytes = emit(BASIC, stage);
            let words = words(&bytes);
            let mut i = 5;
            while i < words.len() {
                let count = (words[i] >> 16) as usize;
                assert!(count > 0, "zero-length instruction at {i}");
                i += count;
            }
            assert_eq!(i, words.len(), "instruction overrun");
        }
    }

    #[test]
    fn entry_point_carries_the_function_name() {
        let bytes = emit(BASIC, Stage::Vertex);
        // OpEntryPoint contains "vsMain" as a NUL-padded literal.
        let needle = b"vsMain\0";
        assert!(
            bytes.windows(needle.len()).any(|w| w == needle),
            "entry point name missing from binary"
        );
    }

    #[test]
    fn capability_and_memory_model_lead() {
        let bytes = emit(BASIC, Stage::Fragment);
        let words = words(&bytes);
        // First instruction after the header: OpCapability Shader.
        assert_eq!(words[5] & 0xffff, 17);
        assert_eq!(words[6], 1);
        let mm = find_inst(&words, 14).expect("OpMemoryModel present");
        assert_eq!(mm, vec![0, 1]); // Logical, GLSL450
    }

    #[test]
    fn fragment_gets_origin_upper_left() {
        let bytes = emit(BASIC, Stage::Fragment);
        let words = words(&bytes);
        let mode = find_inst(&words, 16).expect("OpExecutionMode present");
        assert_eq!(mode[1], 7); // OriginUpperLeft
    }

    #[test]
    fn vertex_has_no_execution_mode() {
        let bytes = emit(BASIC, Stage::Vertex);
        let words = words(&bytes);
        assert!(find_inst(&words, 16).is_none());
    }

    #[test]
    fn samples_use_implicit_lod_in_fragment() {
        let bytes = emit(BASIC, Stage::Fragment);
        let words = words(&bytes);
        assert!(find_inst(&words, 87).is_some(), "OpImageSampleImplicitLod");
    }

    #[test]
    fn set_vertex_position_rejected_in_fragment() {
        let module = parse(
            "[fragment]\nfn fsMain() { setVertexPosition(vec4f(0.0, 0.0, 0.0, 1.0)); }",
        )
        .unwrap();
        match SpirvBackend.compile(&module, Stage::Fragment, &BackendOptions::default()) {
            Err(BackendError::Unsupported { reason, .. }) => {
                assert!(reason.contains("setVertexPosition"));
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_option_rejected() {
        let module = parse("option bool fancy;\n[vertex]\nfn vsMain() { }").unwrap();
        match SpirvBackend.compile(&module, Stage::Vertex, &BackendOptions::default()) {
            Err(BackendError::Unsupported { reason, .. }) => {
                assert!(reason.contains("fancy"));
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn uniform_block_is_decorated() {
        let bytes = emit(BASIC, Stage::Vertex);
        let words = words(&bytes);
        // Some OpDecorate carries Decoration Block (2).
        let mut i = 5;
        let mut found_block = false;
        let mut found_set = false;
        while i < words.len() {
            let count = (words[i] >> 16) as usize;
            let op = (words[i] & 0xffff) as u16;
            if op == 71 {
                match words[i + 2] {
                    2 => found_block = true,
                    34 => found_set = true,
                    _ => {}
                }
            }
            i += count;
        }
        assert!(found_block, "Block decoration missing");
        assert!(found_set, "DescriptorSet decoration missing");
    }

    #[test]
    fn control_flow_emits_structured_merges() {
        let bytes = emit(
            "output(fragment, location = 0) vec4f color;\n\
             [fragment]\n\
             fn fsMain() {\n\
                 float acc = 0.0;\n\
                 for (int i = 0; i < 4; i++) {\n\
                     if (acc > 2.0) { break; }\n\
                     acc += 0.5;\n\
                 }\n\
                 color = vec4f(acc, acc, acc, 1.0);\n\
             }",
            Stage::Fragment,
        );
        let words = words(&bytes);
        assert!(find_inst(&words, 246).is_some(), "OpLoopMerge");
        assert!(find_inst(&words, 247).is_some(), "OpSelectionMerge");
    }

    #[test]
    fn helper_function_calls_lower_to_function_call() {
        let bytes = emit(
            "fn square(float x) -> float { return x * x; }\n\
             output(fragment, location = 0) vec4f color;\n\
             [fragment]\n\
             fn fsMain() {\n\
                 float s = square(0.5);\n\
                 color = vec4f(s, s, s, 1.0);\n\
             }",
            Stage::Fragment,
        );
        let words = words(&bytes);
        assert!(find_inst(&words, 57).is_some(), "OpFunctionCall");
    }

    #[test]
    fn debug_info_adds_names() {
        let module = parse(BASIC).unwrap();
        let module = extract_stage(&module, Stage::Vertex).unwrap();
        let with = SpirvBackend
            .compile(
                &module,
                Stage::Vertex,
                &BackendOptions {
                    debug_info: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let without = SpirvBackend
            .compile(&module, Stage::Vertex, &BackendOptions::default())
            .unwrap();
        let with_words = words(with.as_binary().unwrap());
        let without_words = words(without.as_binary().unwrap());
        assert!(find_inst(&with_words, 5).is_some(), "OpName with debug_info");
        assert!(find_inst(&without_words, 5).is_none());
    }
}
