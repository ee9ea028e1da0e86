use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::structs::sequence::AMINO_ALPHABET_SIZE;

use anyhow::Context;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("malformed hmm file: {reason}")]
pub struct MalformedHmmError {
    pub reason: String,
}

fn malformed(reason: impl Into<String>) -> MalformedHmmError {
    MalformedHmmError {
        reason: reason.into(),
    }
}

/// The fitted score distributions read from the profile file's STATS lines.
///
/// Lambda and the location parameters are in the file's native (bit score)
/// parameterization: a Gumbel for Viterbi scores and an exponential tail
/// for Forward scores.
#[derive(Default, Clone, Debug)]
pub struct HmmStats {
    pub viterbi_lambda: f32,
    pub viterbi_mu: f32,
    pub forward_lambda: f32,
    pub forward_tau: f32,
}

/// One model position: emission and transition probabilities.
///
/// Position 0 is the begin node; it carries insert emissions and
/// transitions but no match emissions.
#[derive(Clone, Debug)]
pub struct HmmPosition {
    pub match_probabilities: [f32; AMINO_ALPHABET_SIZE],
    pub insert_probabilities: [f32; AMINO_ALPHABET_SIZE],
    /// m->m, m->i, m->d, i->m, i->i, d->m, d->d
    pub transitions: [f32; 7],
    /// Consensus residue for the position's match state
    pub consensus: u8,
}

impl Default for HmmPosition {
    fn default() -> Self {
        HmmPosition {
            match_probabilities: [0.0; AMINO_ALPHABET_SIZE],
            insert_probabilities: [0.0; AMINO_ALPHABET_SIZE],
            transitions: [0.0; 7],
            consensus: b'x',
        }
    }
}

/// An HMM profile as parsed from a HMMER3 ASCII file, in probability space.
#[derive(Default, Clone, Debug)]
pub struct Hmm {
    pub name: String,
    pub accession: String,
    pub description: String,
    pub length: usize,
    /// Average emission composition from the COMPO line
    pub compo: [f32; AMINO_ALPHABET_SIZE],
    /// Model positions 0..=length; position 0 is the begin node
    pub positions: Vec<HmmPosition>,
    pub stats: HmmStats,
}

/// Parse "0.123" or the impossible-event marker "*" into a probability.
fn parse_probability(token: &str) -> anyhow::Result<f32> {
    if token == "*" {
        Ok(0.0)
    } else {
        let neg_ln: f32 = token
            .parse()
            .with_context(|| format!("bad probability token: {token}"))?;
        Ok((-neg_ln).exp())
    }
}

fn parse_probability_row<const N: usize>(tokens: &[&str]) -> anyhow::Result<[f32; N]> {
    anyhow::ensure!(
        tokens.len() >= N,
        malformed(format!("expected {N} fields, found {}", tokens.len()))
    );
    let mut row = [0.0f32; N];
    for (value, token) in row.iter_mut().zip(tokens) {
        *value = parse_probability(token)?;
    }
    Ok(row)
}

/// Read every profile from a HMMER3 ASCII .hmm file.
pub fn parse_hmms_from_p7hmm_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Hmm>> {
    let path = path.as_ref();
    let file = File::open(path)
        .context(format!("failed to open hmm file: {}", path.to_string_lossy()))?;
    let mut lines = BufReader::new(file).lines();

    let mut hmms: Vec<Hmm> = vec![];

    loop {
        match parse_one_hmm(&mut lines)? {
            Some(hmm) => hmms.push(hmm),
            None => break,
        }
    }

    anyhow::ensure!(
        !hmms.is_empty(),
        "no profiles found in hmm file: {}",
        path.to_string_lossy()
    );
    Ok(hmms)
}

fn parse_one_hmm(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> anyhow::Result<Option<Hmm>> {
    let mut hmm = Hmm::default();
    let mut saw_header = false;

    // header section, up to the "HMM" column-label line
    loop {
        let line = match lines.next() {
            Some(line) => line.context("failed to read hmm line")?,
            None if saw_header => return Err(malformed("unexpected end of header").into()),
            None => return Ok(None),
        };
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        saw_header = true;

        let mut tokens = line.split_whitespace();
        let tag = tokens.next().unwrap_or_default();
        match tag {
            tag if tag.starts_with("HMMER3") => {}
            "NAME" => hmm.name = tokens.next().unwrap_or_default().to_string(),
            "ACC" => hmm.accession = tokens.next().unwrap_or_default().to_string(),
            "DESC" => hmm.description = tokens.collect::<Vec<_>>().join(" "),
            "LENG" => {
                hmm.length = tokens
                    .next()
                    .unwrap_or_default()
                    .parse()
                    .context("bad LENG field")?
            }
            "ALPH" => {
                let alphabet = tokens.next().unwrap_or_default().to_lowercase();
                anyhow::ensure!(
                    alphabet == "amino",
                    malformed(format!("unsupported alphabet: {alphabet}"))
                );
            }
            "STATS" => {
                let tokens: Vec<&str> = tokens.collect();
                anyhow::ensure!(tokens.len() >= 4, malformed("short STATS line"));
                // field order in the file is location (mu / tau), then lambda
                let location: f32 = tokens[2].parse().context("bad STATS location")?;
                let lambda: f32 = tokens[3].parse().context("bad STATS lambda")?;
                match (tokens[0], tokens[1]) {
                    ("LOCAL", "VITERBI") => {
                        hmm.stats.viterbi_lambda = lambda;
                        hmm.stats.viterbi_mu = location;
                    }
                    ("LOCAL", "FORWARD") => {
                        hmm.stats.forward_lambda = lambda;
                        hmm.stats.forward_tau = location;
                    }
                    // MSV statistics are for a filter this pipeline doesn't run
                    _ => {}
                }
            }
            "HMM" => break,
            // remaining header tags (DATE, EFFN, CKSUM, GA, ..) carry no model data
            _ => {}
        }
    }

    anyhow::ensure!(hmm.length > 0, malformed("missing or zero LENG"));

    // transition label line
    lines
        .next()
        .transpose()
        .context("failed to read hmm line")?
        .ok_or_else(|| malformed("missing transition label line"))?;

    hmm.positions = vec![HmmPosition::default(); hmm.length + 1];

    let mut next_line = || -> anyhow::Result<Vec<String>> {
        loop {
            let line = lines
                .next()
                .transpose()
                .context("failed to read hmm line")?
                .ok_or_else(|| malformed("unexpected end of model body"))?;
            if !line.trim().is_empty() {
                return Ok(line.split_whitespace().map(str::to_string).collect());
            }
        }
    };

    // optional COMPO line, then the begin node's insert/transition pair
    let mut tokens = next_line()?;
    if tokens[0] == "COMPO" {
        let refs: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();
        hmm.compo = parse_probability_row(&refs)?;
        tokens = next_line()?;
    }

    {
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        hmm.positions[0].insert_probabilities = parse_probability_row(&refs)?;
        let transition_tokens = next_line()?;
        let refs: Vec<&str> = transition_tokens.iter().map(String::as_str).collect();
        hmm.positions[0].transitions = parse_probability_row(&refs)?;
    }

    // model positions 1..=length: match, insert, transition line triples
    for position_idx in 1..=hmm.length {
        let match_tokens = next_line()?;
        let line_idx: usize = match_tokens[0]
            .parse()
            .with_context(|| format!("bad node index: {}", match_tokens[0]))?;
        anyhow::ensure!(
            line_idx == position_idx,
            malformed(format!(
                "node index mismatch: expected {position_idx}, found {line_idx}"
            ))
        );

        let position = &mut hmm.positions[position_idx];
        let refs: Vec<&str> = match_tokens.iter().skip(1).map(String::as_str).collect();
        position.match_probabilities = parse_probability_row(&refs)?;
        // MAP/CONS/RF/MM/CS annotation columns follow the emission fields
        if let Some(consensus) = match_tokens.get(1 + AMINO_ALPHABET_SIZE + 1) {
            position.consensus = consensus.bytes().next().unwrap_or(b'x');
        }

        let insert_tokens = next_line()?;
        let refs: Vec<&str> = insert_tokens.iter().map(String::as_str).collect();
        position.insert_probabilities = parse_probability_row(&refs)?;

        let transition_tokens = next_line()?;
        let refs: Vec<&str> = transition_tokens.iter().map(String::as_str).collect();
        position.transitions = parse_probability_row(&refs)?;
    }

    // closing slashes
    let closing = next_line()?;
    anyhow::ensure!(closing[0] == "//", malformed("missing // terminator"));

    Ok(Some(hmm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TINY_HMM: &str = "\
HMMER3/f [3.3.2 | Nov 2020]
NAME  tiny
ACC   TN001
DESC  two position test model
LENG  2
ALPH  amino
STATS LOCAL MSV      -9.8664  0.71295
STATS LOCAL VITERBI -10.7223  0.71295
STATS LOCAL FORWARD  -4.1978  0.71295
HMM          A        C        D        E        F        G        H        I        K        L        M        N        P        Q        R        S        T        V        W        Y
            m->m     m->i     m->d     i->m     i->i     d->m     d->d
  COMPO   2.36553  4.52577  2.96709  2.70473  3.20818  3.02239  3.41069  2.90041  2.55332  2.35210  3.67329  3.19812  3.45595  3.16091  3.07934  2.66722  2.85475  2.56965  4.55393  3.62921
          2.68618  4.42225  2.77519  2.73123  3.46354  2.40513  3.72494  3.29354  2.67741  2.69355  4.24690  2.90347  2.73739  3.18146  2.89801  2.37887  2.77519  2.98518  4.58477  3.61503
          0.02000  4.00000  4.60517  0.61315  0.77900  0.00000        *
      1   0.50000  5.00000  2.00000  3.00000  4.00000  3.00000  4.00000  3.00000  3.00000  3.00000  4.00000  3.00000  4.00000  3.00000  3.00000  3.00000  3.00000  3.00000  5.00000  4.00000      1 a - - -
          2.68618  4.42225  2.77519  2.73123  3.46354  2.40513  3.72494  3.29354  2.67741  2.69355  4.24690  2.90347  2.73739  3.18146  2.89801  2.37887  2.77519  2.98518  4.58477  3.61503
          0.02000  4.00000  4.60517  0.61315  0.77900  0.48000  0.95000
      2   3.00000  5.00000  2.00000  0.60000  4.00000  3.00000  4.00000  3.00000  3.00000  3.00000  4.00000  3.00000  4.00000  3.00000  3.00000  3.00000  3.00000  3.00000  5.00000  4.00000      2 e - - -
          2.68618  4.42225  2.77519  2.73123  3.46354  2.40513  3.72494  3.29354  2.67741  2.69355  4.24690  2.90347  2.73739  3.18146  2.89801  2.37887  2.77519  2.98518  4.58477  3.61503
          0.01000  5.00000        *  0.61315  0.77900  0.48000  0.95000
//
";

    #[test]
    fn test_parse_tiny_hmm() {
        let dir = std::env::temp_dir();
        let path = dir.join("cloudseqs_tiny_test.hmm");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(TINY_HMM.as_bytes()).unwrap();

        let hmms = parse_hmms_from_p7hmm_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(hmms.len(), 1);
        let hmm = &hmms[0];
        assert_eq!(hmm.name, "tiny");
        assert_eq!(hmm.accession, "TN001");
        assert_eq!(hmm.length, 2);
        assert!((hmm.stats.forward_lambda - 0.71295).abs() < 1e-5);
        assert!((hmm.stats.forward_tau - -4.1978).abs() < 1e-5);

        // 0.50000 is -ln p for the A emission of node 1
        let p = hmm.positions[1].match_probabilities[0];
        assert!((p - (-0.5f32).exp()).abs() < 1e-6);
        // "*" transitions parse as probability zero
        assert_eq!(hmm.positions[2].transitions[2], 0.0);
        assert_eq!(hmm.positions[1].consensus, b'a');
    }
}
