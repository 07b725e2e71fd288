//! SPIR-V physical encoding: opcodes, enum operands, and instruction
//! assembly.
//!
//! Only the opcode surface the writer emits is listed; values are from
//! the SPIR-V 1.0 specification.

/// A 32-bit SPIR-V word.
pub type Word = u32;

/// The SPIR-V magic number.
pub const MAGIC: Word = 0x0723_0203;
/// Encoded version 1.0.
pub const VERSION: Word = 0x0001_0000;
/// Generator magic (0 = unregistered tool).
pub const GENERATOR: Word = 0;

/// Opcodes used by the writer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum Op {
    Name = 5,
    ExtInstImport = 11,
    ExtInst = 12,
    MemoryModel = 14,
    EntryPoint = 15,
    ExecutionMode = 16,
    Capability = 17,
    TypeVoid = 19,
    TypeBool = 20,
    TypeInt = 21,
    TypeFloat = 22,
    TypeVector = 23,
    TypeMatrix = 24,
    TypeImage = 25,
    TypeSampledImage = 27,
    TypeArray = 28,
    TypeStruct = 30,
    TypePointer = 32,
    TypeFunction = 33,
    ConstantTrue = 41,
    ConstantFalse = 42,
    Constant = 43,
    ConstantComposite = 44,
    Function = 54,
    FunctionParameter = 55,
    FunctionEnd = 56,
    FunctionCall = 57,
    Variable = 59,
    Load = 61,
    Store = 62,
    AccessChain = 65,
    Decorate = 71,
    MemberDecorate = 72,
    VectorShuffle = 79,
    CompositeConstruct = 80,
    CompositeExtract = 81,
    ImageSampleImplicitLod = 87,
    ImageSampleExplicitLod = 88,
    ConvertFToU = 109,
    ConvertFToS = 110,
    ConvertSToF = 111,
    ConvertUToF = 112,
    Bitcast = 124,
    SNegate = 126,
    FNegate = 127,
    IAdd = 128,
    FAdd = 129,
    ISub = 130,
    FSub = 131,
    IMul = 132,
    FMul = 133,
    UDiv = 134,
    SDiv = 135,
    FDiv = 136,
    UMod = 137,
    SRem = 138,
    FRem = 140,
    VectorTimesScalar = 142,
    MatrixTimesScalar = 143,
    VectorTimesMatrix = 144,
    MatrixTimesVector = 145,
    MatrixTimesMatrix = 146,
    Dot = 148,
    LogicalEqual = 164,
    LogicalNotEqual = 165,
    LogicalOr = 166,
    LogicalAnd = 167,
    LogicalNot = 168,
    Select = 169,
    IEqual = 170,
    INotEqual = 171,
    UGreaterThan = 172,
    SGreaterThan = 173,
    UGreaterThanEqual = 174,
    SGreaterThanEqual = 175,
    ULessThan = 176,
    SLessThan = 177,
    ULessThanEqual = 178,
    SLessThanEqual = 179,
    FOrdEqual = 180,
    FOrdNotEqual = 182,
    FOrdLessThan = 184,
    FOrdGreaterThan = 186,
    FOrdLessThanEqual = 188,
    FOrdGreaterThanEqual = 190,
    LoopMerge = 246,
    SelectionMerge = 247,
    Label = 248,
    Branch = 249,
    BranchConditional = 250,
    Return = 253,
    ReturnValue = 254,
    Unreachable = 255,
}

/// GLSL.std.450 extended instruction numbers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum GlslExt {
    FAbs = 4,
    Floor = 8,
    Ceil = 9,
    Fract = 10,
    Sin = 13,
    Cos = 14,
    Tan = 15,
    Pow = 26,
    Sqrt = 31,
    FMin = 37,
    UMin = 38,
    SMin = 39,
    FMax = 40,
    UMax = 41,
    SMax = 42,
    FClamp = 43,
    UClamp = 44,
    SClamp = 45,
    FMix = 46,
    Step = 48,
    SmoothStep = 49,
    Length = 66,
    Distance = 67,
    Cross = 68,
    Normalize = 69,
    Reflect = 71,
}

/// Storage classes.
pub mod storage {
    use super::Word;
    pub const UNIFORM_CONSTANT: Word = 0;
    pub const INPUT: Word = 1;
    pub const UNIFORM: Word = 2;
    pub const OUTPUT: Word = 3;
    pub const PRIVATE: Word = 6;
    pub const FUNCTION: Word = 7;
}

/// Decorations.
pub mod decoration {
    use super::Word;
    pub const BLOCK: Word = 2;
    pub const COL_MAJOR: Word = 5;
    pub const ARRAY_STRIDE: Word = 6;
    pub const MATRIX_STRIDE: Word = 7;
    pub const BUILT_IN: Word = 11;
    pub const LOCATION: Word = 30;
    pub const BINDING: Word = 33;
    pub const DESCRIPTOR_SET: Word = 34;
    pub const OFFSET: Word = 35;
}

/// Built-in variable numbers.
pub mod builtin {
    use super::Word;
    pub const POSITION: Word = 0;
}

/// Execution models for `OpEntryPoint`.
pub mod execution_model {
    use super::Word;
    pub const VERTEX: Word = 0;
    pub const FRAGMENT: Word = 4;
}

/// Execution modes.
pub mod execution_mode {
    use super::Word;
    pub const ORIGIN_UPPER_LEFT: Word = 7;
}

/// Miscellaneous enum operand values.
pub mod misc {
    use super::Word;
    /// Capability Shader.
    pub const CAPABILITY_SHADER: Word = 1;
    /// Addressing model Logical.
    pub const ADDRESSING_LOGICAL: Word = 0;
    /// Memory model GLSL450.
    pub const MEMORY_GLSL450: Word = 1;
    /// Image dimensionality.
    pub const DIM_1D: Word = 0;
    pub const DIM_2D: Word = 1;
    pub const DIM_3D: Word = 2;
    pub const DIM_CUBE: Word = 3;
    /// Image operand bit: explicit Lod.
    pub const IMAGE_OPERAND_LOD: Word = 0x2;
    /// Loop/selection control: None.
    pub const CONTROL_NONE: Word = 0;
    /// Function control: None.
    pub const FUNCTION_CONTROL_NONE: Word = 0;
}

/// Appends one instruction: `(word_count << 16 | opcode)` followed by
/// its operand words.
pub fn push_inst(out: &mut Vec<Word>, op: Op, operands: &[Word]) {
    let word_count = (operands.len() as Word + 1) << 16;
    out.push(word_count | op as Word);
    out.extend_from_slice(operands);
}

/// Encodes a string operand: UTF-8 bytes, NUL-terminated, padded to a
/// word boundary, little-endian within each word.
pub fn string_words(s: &str) -> Vec<Word> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Serializes a word stream to little-endian bytes.
pub fn words_to_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_word_count() {
        let mut out = Vec::new();
        push_inst(&mut out, Op::Capability, &[misc::CAPABILITY_SHADER]);
        assert_eq!(out, vec![(2 << 16) | 17, 1]);
    }

    #[test]
    fn string_encoding_pads_and_terminates() {
        // "main" + NUL = 5 bytes -> 2 words.
        let words = string_words("main");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], u32::from_le_bytes(*b"main"));
        assert_eq!(words[1], 0);

        // Exactly one word of text still gets a NUL word.
        let words = string_words("abc");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0], u32::from_le_bytes([b'a', b'b', b'c', 0]));
    }

    #[test]
    fn bytes_are_little_endian() {
        assert_eq!(words_to_bytes(&[MAGIC]), vec![0x03, 0x02, 0x23, 0x07]);
    }
}
