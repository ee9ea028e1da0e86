use crate::structs::dp_matrix::{
    DpMatrix, SPECIAL_B, SPECIAL_C, SPECIAL_E, SPECIAL_J, SPECIAL_N,
};
use crate::structs::trace::{Trace, TraceState};
use crate::structs::Profile;

/// A predecessor is admissible only where the profile transition exists.
#[inline]
fn gated(transition_score: f32, value: f32) -> f32 {
    if transition_score == -f32::INFINITY {
        -f32::INFINITY
    } else {
        value
    }
}

/// Pick the best candidate; earlier entries win ties, which pins the
/// M > I > D > B preference order.
fn argmax(candidates: &[(TraceState, f32)]) -> TraceState {
    let mut best = candidates[0];
    for &candidate in &candidates[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0
}

/// Trace the optimal-accuracy path back from the terminal C state.
pub fn traceback_bounded(
    profile: &Profile,
    posterior_matrix: &impl DpMatrix,
    optimal_matrix: &impl DpMatrix,
    trace: &mut Trace,
    target_end: usize,
) {
    traceback_bounded_in_range(profile, posterior_matrix, optimal_matrix, trace, 1, target_end)
}

pub fn traceback_bounded_in_range(
    profile: &Profile,
    posterior_matrix: &impl DpMatrix,
    optimal_matrix: &impl DpMatrix,
    trace: &mut Trace,
    range_start: usize,
    range_end: usize,
) {
    let profile_length = profile.length;
    let top_row = range_start - 1;

    if optimal_matrix.get_special(SPECIAL_C, range_end) == -f32::INFINITY {
        // no path reached the terminal; leave the trace empty
        return;
    }

    trace.push(TraceState::T, range_end, 0);

    let mut state = TraceState::C;
    let mut target_idx = range_end;
    let mut profile_idx = 0usize;

    loop {
        match state {
            TraceState::C => {
                trace.push(TraceState::C, target_idx, 0);
                let from_loop = optimal_matrix.get_special(SPECIAL_C, target_idx - 1)
                    + posterior_matrix.get_special(SPECIAL_C, target_idx);
                let from_end = optimal_matrix.get_special(SPECIAL_E, target_idx);
                if from_end >= from_loop {
                    state = TraceState::E;
                } else {
                    target_idx -= 1;
                }
            }
            TraceState::E => {
                trace.push(TraceState::E, target_idx, 0);
                // re-find the row cell the E exit came from
                let end_value = optimal_matrix.get_special(SPECIAL_E, target_idx);
                let mut found = false;
                for candidate_idx in 1..=profile_length {
                    if optimal_matrix.get_match(target_idx, candidate_idx) == end_value {
                        state = TraceState::M;
                        profile_idx = candidate_idx;
                        found = true;
                        break;
                    }
                    if optimal_matrix.get_delete(target_idx, candidate_idx) == end_value {
                        state = TraceState::D;
                        profile_idx = candidate_idx;
                        found = true;
                        break;
                    }
                }
                debug_assert!(found, "E state with no source cell in row {target_idx}");
                if !found {
                    return;
                }
            }
            TraceState::M => {
                trace.push(TraceState::M, target_idx, profile_idx);
                state = argmax(&[
                    (
                        TraceState::M,
                        gated(
                            profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx - 1),
                            optimal_matrix.get_match(target_idx - 1, profile_idx - 1),
                        ),
                    ),
                    (
                        TraceState::I,
                        gated(
                            profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx - 1),
                            optimal_matrix.get_insert(target_idx - 1, profile_idx - 1),
                        ),
                    ),
                    (
                        TraceState::D,
                        gated(
                            profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx - 1),
                            optimal_matrix.get_delete(target_idx - 1, profile_idx - 1),
                        ),
                    ),
                    (
                        TraceState::B,
                        gated(
                            profile.begin_to_match_score(profile_idx),
                            optimal_matrix.get_special(SPECIAL_B, target_idx - 1),
                        ),
                    ),
                ]);
                target_idx -= 1;
                profile_idx = profile_idx.saturating_sub(1);
            }
            TraceState::I => {
                trace.push(TraceState::I, target_idx, profile_idx);
                state = argmax(&[
                    (
                        TraceState::M,
                        gated(
                            profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                            optimal_matrix.get_match(target_idx - 1, profile_idx),
                        ),
                    ),
                    (
                        TraceState::I,
                        gated(
                            profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                            optimal_matrix.get_insert(target_idx - 1, profile_idx),
                        ),
                    ),
                ]);
                target_idx -= 1;
            }
            TraceState::D => {
                trace.push(TraceState::D, target_idx, profile_idx);
                state = argmax(&[
                    (
                        TraceState::M,
                        gated(
                            profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx - 1),
                            optimal_matrix.get_match(target_idx, profile_idx - 1),
                        ),
                    ),
                    (
                        TraceState::D,
                        gated(
                            profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx - 1),
                            optimal_matrix.get_delete(target_idx, profile_idx - 1),
                        ),
                    ),
                ]);
                profile_idx -= 1;
            }
            TraceState::B => {
                trace.push(TraceState::B, target_idx, 0);
                let from_n = optimal_matrix.get_special(SPECIAL_N, target_idx);
                let from_j = optimal_matrix.get_special(SPECIAL_J, target_idx);
                state = if from_n >= from_j {
                    TraceState::N
                } else {
                    TraceState::J
                };
            }
            TraceState::J => {
                trace.push(TraceState::J, target_idx, 0);
                let from_loop = optimal_matrix.get_special(SPECIAL_J, target_idx - 1)
                    + posterior_matrix.get_special(SPECIAL_J, target_idx);
                let from_end = optimal_matrix.get_special(SPECIAL_E, target_idx);
                if from_end >= from_loop {
                    state = TraceState::E;
                } else {
                    target_idx -= 1;
                }
            }
            TraceState::N => {
                trace.push(TraceState::N, target_idx, 0);
                if target_idx == top_row {
                    trace.push(TraceState::S, top_row, 0);
                    break;
                }
                target_idx -= 1;
            }
            _ => unreachable!("invalid traceback state"),
        }
    }

    trace.reverse();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::bounded::backward::backward_bounded;
    use crate::align::bounded::forward::forward_bounded;
    use crate::align::bounded::optimal_accuracy::optimal_accuracy_bounded;
    use crate::align::bounded::posterior::posterior_bounded;
    use crate::align::bounded::structs::RowBounds;
    use crate::structs::{DpMatrixFlat, Sequence};
    use crate::test_utils::{random_profile, random_sequence, rng};

    fn trace_for(target: &Sequence, profile: &Profile) -> Trace {
        let row_bounds = RowBounds::full(target.length, profile.length);
        let mut forward_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut posterior_matrix = DpMatrixFlat::new(target.length, profile.length);
        let mut optimal_matrix = DpMatrixFlat::new(target.length, profile.length);

        forward_bounded(profile, target, &mut forward_matrix, &row_bounds);
        backward_bounded(profile, target, &mut posterior_matrix, &row_bounds);
        posterior_bounded(profile, &forward_matrix, &mut posterior_matrix, &row_bounds);
        optimal_accuracy_bounded(profile, &posterior_matrix, &mut optimal_matrix, &row_bounds);

        let mut trace = Trace::new(target.length, profile.length);
        traceback_bounded(
            profile,
            &posterior_matrix,
            &optimal_matrix,
            &mut trace,
            target.length,
        );
        trace
    }

    #[test]
    fn test_trace_runs_from_start_to_terminal() {
        let mut rng = rng(47);
        let mut profile = random_profile(12, &mut rng);
        let target = random_sequence(20, &mut rng);
        profile.configure_for_target_length(target.length);

        let trace = trace_for(&target, &profile);

        assert_eq!(trace.steps.first().unwrap().state, TraceState::S);
        assert_eq!(trace.steps.last().unwrap().state, TraceState::T);
        assert!(!trace.core_regions().is_empty());
    }

    #[test]
    fn test_trace_emits_each_target_row_exactly_once() {
        let mut rng = rng(53);
        let mut profile = random_profile(10, &mut rng);
        let target = random_sequence(18, &mut rng);
        profile.configure_for_target_length(target.length);

        let trace = trace_for(&target, &profile);

        // rows are consumed by M, I, and the loop emissions of N/J/C
        // (the first N and the C entered from E emit nothing)
        let mut emitted = vec![0usize; target.length + 1];
        let mut previous_state = TraceState::S;
        for step in &trace.steps {
            match step.state {
                TraceState::M | TraceState::I => emitted[step.target_idx] += 1,
                TraceState::N | TraceState::C | TraceState::J => {
                    if step.state == previous_state {
                        emitted[step.target_idx] += 1;
                    }
                }
                _ => {}
            }
            previous_state = step.state;
        }
        for (target_idx, count) in emitted.iter().enumerate().skip(1) {
            assert_eq!(*count, 1, "row {target_idx} emitted {count} times");
        }
    }

    #[test]
    fn test_traceback_is_deterministic() {
        let mut rng = rng(59);
        let mut profile = random_profile(14, &mut rng);
        let target = random_sequence(22, &mut rng);
        profile.configure_for_target_length(target.length);

        let first = trace_for(&target, &profile);
        let second = trace_for(&target, &profile);

        assert_eq!(first.steps.len(), second.steps.len());
        for (a, b) in first.steps.iter().zip(second.steps.iter()) {
            assert_eq!(a.state, b.state);
            assert_eq!(a.target_idx, b.target_idx);
            assert_eq!(a.profile_idx, b.profile_idx);
        }
    }
}
