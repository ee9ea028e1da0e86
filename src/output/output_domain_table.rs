use std::io::Write;

use crate::pipeline::PairResult;

/// Write one row per decoded domain behind a commented header.
pub fn write_domain_table_output(
    results: &[PairResult],
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    writeln!(
        writer,
        "#{}",
        [
            "profile",
            "target",
            "domain",
            "of",
            "target-start",
            "target-end",
            "bits",
            "E-value",
            "fwd-nats",
            "bias-nats",
            "acc",
        ]
        .join("\t")
    )?;

    for result in results {
        let domain_count = result.domains.len();
        for (domain_idx, domain) in result.domains.iter().enumerate() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2e}\t{:.2}\t{:.2}\t{:.3}",
                result.profile_name,
                result.target_name,
                domain_idx + 1,
                domain_count,
                domain.range.start,
                domain.range.end,
                domain.alignment.score_bits,
                domain.alignment.evalue,
                domain.forward_score_nats,
                domain.null2_score_nats,
                // expected accuracy per aligned residue
                domain.optimal_accuracy / domain.range.residue_count() as f32,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_domains_writes_header_only() {
        let results = vec![PairResult::default()];
        let mut buffer: Vec<u8> = vec![];
        write_domain_table_output(&results, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with('#'));
    }
}
