use std::io::Write;

use crate::structs::Alignment;

/// Write alignments as tab-separated rows behind a commented header.
pub fn write_tabular_output(
    alignments: &[Alignment],
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    writeln!(
        writer,
        "#{}",
        [
            "profile", "target", "profile-start", "profile-end", "target-start", "target-end",
            "bits", "E-value", "cigar",
        ]
        .join("\t")
    )?;

    for alignment in alignments {
        writeln!(writer, "{}", alignment.tab_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_when_empty() {
        let mut buffer: Vec<u8> = vec![];
        write_tabular_output(&[], &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with('#'));
        assert_eq!(text.lines().count(), 1);
    }
}
