//! Shared builders for unit tests: deterministic random models and sequences.

use crate::structs::hmm::{Hmm, HmmPosition, HmmStats};
use crate::structs::sequence::AMINO_ALPHABET_SIZE;
use crate::structs::{Profile, Sequence};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A model whose match states all emit uniformly.
pub fn uniform_hmm(length: usize) -> Hmm {
    let mut positions = vec![HmmPosition::default(); length + 1];
    for (position_idx, position) in positions.iter_mut().enumerate() {
        for residue in 0..AMINO_ALPHABET_SIZE {
            position.match_probabilities[residue] = 1.0 / AMINO_ALPHABET_SIZE as f32;
            position.insert_probabilities[residue] = 1.0 / AMINO_ALPHABET_SIZE as f32;
        }
        position.transitions = [0.9, 0.05, 0.05, 0.4, 0.6, 0.6, 0.4];
        if position_idx == length {
            position.transitions = [1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        }
        position.consensus = b'a';
    }

    Hmm {
        name: "uniform-test".to_string(),
        accession: String::new(),
        description: String::new(),
        length,
        compo: [1.0 / AMINO_ALPHABET_SIZE as f32; AMINO_ALPHABET_SIZE],
        positions,
        stats: HmmStats {
            viterbi_lambda: 0.693,
            viterbi_mu: -5.0,
            forward_lambda: 0.693,
            forward_tau: -8.0,
        },
    }
}

/// A model with randomly skewed match emissions.
pub fn random_hmm(length: usize, rng: &mut StdRng) -> Hmm {
    let mut hmm = uniform_hmm(length);
    for position in hmm.positions.iter_mut().skip(1) {
        let mut total = 0.0f32;
        for residue in 0..AMINO_ALPHABET_SIZE {
            let weight: f32 = rng.gen_range(0.05..1.0);
            position.match_probabilities[residue] = weight;
            total += weight;
        }
        for residue in 0..AMINO_ALPHABET_SIZE {
            position.match_probabilities[residue] /= total;
        }
    }
    hmm
}

pub fn random_profile(length: usize, rng: &mut StdRng) -> Profile {
    Profile::new(&random_hmm(length, rng))
}

pub fn random_sequence(length: usize, rng: &mut StdRng) -> Sequence {
    let codes: Vec<u8> = (0..length)
        .map(|_| rng.gen_range(0..AMINO_ALPHABET_SIZE as u8))
        .collect();
    let mut sequence = Sequence::from_digital(&codes).unwrap();
    sequence.name = "random-test".to_string();
    sequence
}
