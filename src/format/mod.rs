//! Output formats for decoded instructions

mod csv;
mod json;

pub use self::csv::*;
pub use self::json::*;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;

use crate::{DecodedInstruction, DetailError};

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text listing (default)
    #[default]
    Text,
    /// Pretty-printed JSON array, details included
    Json,
    /// One JSON object per line
    JsonLines,
    /// Comma-separated values, one row per instruction
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    pub fn formatter(&self) -> Box<dyn InstructionFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }

    /// Render `insns` in this format and write the result to `path`.
    pub fn write_to_file<P: AsRef<Path>>(
        &self,
        insns: &[DecodedInstruction],
        path: P,
    ) -> Result<(), DetailError> {
        let rendered = self.formatter().format(insns)?;
        fs::write(path.as_ref(), rendered)?;
        log::debug!(
            "wrote {} instructions as {} to {}",
            insns.len(),
            self,
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Renders a sequence of instructions.
pub trait InstructionFormatter {
    fn format(&self, insns: &[DecodedInstruction]) -> Result<String, DetailError>;
}

/// Plain text listing: address, mnemonic, operands, encoding.
pub struct TextFormatter;

impl InstructionFormatter for TextFormatter {
    fn format(&self, insns: &[DecodedInstruction]) -> Result<String, DetailError> {
        let mut output = String::new();
        for insn in insns {
            let (mnemonic, operands) = if insn.is_bad_byte() {
                (".byte", format!("{:#04x}", insn.bytes.first().copied().unwrap_or(0)))
            } else {
                (insn.mnemonic.as_str(), insn.operand_text.clone())
            };
            output.push_str(&format!(
                "0x{:08x}: {:<10} {:<30} ; {}\n",
                insn.address,
                mnemonic,
                operands,
                insn.hex_bytes()
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
pub(crate) fn sample_instructions() -> Vec<DecodedInstruction> {
    use crate::stub_oracle::record;
    use crate::Architecture;

    let mut push = record(None);
    push.address = 0x1000;
    push.size = 1;
    push.bytes = vec![0x55];
    push.mnemonic = "push".to_string();
    push.op_str = "ebp".to_string();

    let mut mov = record(None);
    mov.address = 0x1001;
    mov.bytes = vec![0x89, 0xe5];
    mov.mnemonic = "mov".to_string();
    mov.op_str = "ebp, esp".to_string();

    vec![
        DecodedInstruction::from_record(Architecture::X86, push, None).unwrap(),
        DecodedInstruction::from_record(Architecture::X86, mov, None).unwrap(),
        DecodedInstruction::bad_byte(Architecture::X86, 0x1003, 0xd6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_text_formatter() {
        let result = TextFormatter.format(&sample_instructions()).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0x00001000: push"));
        assert!(lines[1].contains("ebp, esp"));
        assert!(lines[1].ends_with("; 89 e5"));
        assert!(lines[2].starts_with("0x00001003: .byte      0xd6"));
    }

    #[rstest]
    #[case("text", OutputFormat::Text)]
    #[case("JSON", OutputFormat::Json)]
    #[case("jsonlines", OutputFormat::JsonLines)]
    #[case("csv", OutputFormat::Csv)]
    fn test_parse_format(#[case] name: &str, #[case] expected: OutputFormat) {
        assert_eq!(name.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!("ngram".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_every_format_renders() {
        let insns = sample_instructions();
        for format in OutputFormat::available_formats() {
            let rendered = format.formatter().format(&insns).unwrap();
            assert!(rendered.contains("push"), "{format} lost the mnemonic");
        }
    }

    #[test]
    fn test_write_to_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.txt");
        OutputFormat::Text.write_to_file(&sample_instructions(), &path)?;
        let written = std::fs::read_to_string(&path)?;
        assert_eq!(written.lines().count(), 3);
        Ok(())
    }
}
