use crate::align::bounded::structs::{
    CloudBound, CloudBoundGroup, CloudMatrixLinear, CloudSearchParams, Seed,
};
use crate::log_sum::log_sum;
use crate::structs::{Profile, Sequence};

/// Scores reported by one pruned sweep.
///
/// `inner_max_score` is the best cell seen while the sweep was still inside
/// the seed's antidiagonal envelope; `max_score` is the sweep-wide best.
#[derive(Debug, Clone, Copy)]
pub struct CloudSearchScores {
    pub max_score: f32,
    pub inner_max_score: f32,
    pub num_cells_computed: usize,
    pub hit_cell_cap: bool,
}

impl Default for CloudSearchScores {
    fn default() -> Self {
        CloudSearchScores {
            max_score: -f32::INFINITY,
            inner_max_score: -f32::INFINITY,
            num_cells_computed: 0,
            hit_cell_cap: false,
        }
    }
}

/// The composite cloud filter score: the best score inside the seed
/// envelope plus what each sweep gained beyond it.
pub fn cloud_score(forward_scores: &CloudSearchScores, backward_scores: &CloudSearchScores) -> f32 {
    let inner_max = forward_scores
        .inner_max_score
        .max(backward_scores.inner_max_score);
    let outer_forward = forward_scores.max_score - forward_scores.inner_max_score;
    let outer_backward = backward_scores.max_score - backward_scores.inner_max_score;
    inner_max + outer_forward + outer_backward
}

/// Trim a bound from both edges, dropping cells whose best state value on
/// the previous antidiagonal fell below `limit`. No bifurcation: an
/// interior cell below the limit never splits the bound.
fn trim_bound_by_xdrop(
    cloud_matrix: &CloudMatrixLinear,
    plane: usize,
    lb: usize,
    rb: usize,
    limit: f32,
) -> Option<(usize, usize)> {
    let mut new_lb = None;
    for k in lb..rb {
        if cloud_matrix.cell_max(plane, k) >= limit {
            new_lb = Some(k);
            break;
        }
    }
    let new_lb = new_lb?;

    let mut new_rb = new_lb + 1;
    for k in (new_lb..rb).rev() {
        if cloud_matrix.cell_max(plane, k) >= limit {
            new_rb = k + 1;
            break;
        }
    }
    Some((new_lb, new_rb))
}

/// Forward pruned sweep from the seed start toward the lattice corner.
pub fn cloud_search_forward(
    profile: &Profile,
    target: &Sequence,
    seed: &Seed,
    cloud_matrix: &mut CloudMatrixLinear,
    params: &CloudSearchParams,
    bounds: &mut CloudBoundGroup,
) -> CloudSearchScores {
    let target_length = target.length;
    let profile_length = profile.length;

    let seed_target_start = seed.target_start.clamp(1, target_length);
    let seed_profile_start = seed.profile_start.clamp(1, profile_length);
    let seed_end_antidiagonal =
        seed.target_end.clamp(1, target_length) + seed.profile_end.clamp(1, profile_length);

    let first_antidiagonal = seed_target_start + seed_profile_start;
    let last_antidiagonal = target_length + profile_length;

    // entry values B(i); the J feedback path cannot complete inside a
    // seeded sweep, so B is fed by the N path alone
    let n_loop = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_LOOP);
    let n_move = profile.special_transition_score(Profile::SPECIAL_N, Profile::SPECIAL_MOVE);
    let begin_score = |target_idx: usize| n_move + target_idx as f32 * n_loop;

    let mut scores = CloudSearchScores::default();
    let mut total_max = -f32::INFINITY;
    let mut previous_diag_max = -f32::INFINITY;

    let mut previous_bounds: Vec<(usize, usize)> = vec![];
    let mut plane_written: [Option<(usize, usize)>; 3] = [None; 3];

    for (antidiagonal_count, antidiagonal) in (first_antidiagonal..=last_antidiagonal).enumerate() {
        let d0 = antidiagonal % 3;
        let d1 = (antidiagonal + 2) % 3;
        let d2 = (antidiagonal + 1) % 3;

        // bounds for this antidiagonal: prune the previous antidiagonal's
        // bounds, then let them grow one cell
        let mut current_bounds: Vec<(usize, usize)> = vec![];
        if antidiagonal_count == 0 {
            current_bounds.push((seed_target_start, seed_target_start + 1));
        } else {
            let prune = antidiagonal_count > params.gamma;
            let diag_limit = previous_diag_max - params.alpha;

            for &(lb, rb) in &previous_bounds {
                let trimmed = if prune {
                    trim_bound_by_xdrop(cloud_matrix, d1, lb, rb, diag_limit)
                } else {
                    Some((lb, rb))
                };
                let (lb, rb) = match trimmed {
                    Some(bound) => bound,
                    None => continue,
                };

                // the band widens one cell on each side, clipped to the
                // lattice; fresh edge cells enter through the B state
                let lb = (lb.saturating_sub(1))
                    .max(1)
                    .max(antidiagonal.saturating_sub(profile_length));
                let rb = (rb + 1).min(target_length + 1).min(antidiagonal);
                if lb < rb {
                    current_bounds.push((lb, rb));
                }
            }
        }

        if current_bounds.is_empty() {
            break;
        }

        // this plane last held the antidiagonal three back; scrub it
        if let Some((lb, rb)) = plane_written[d0].take() {
            cloud_matrix.scrub(d0, lb, rb);
        }
        let hull_lb = current_bounds[0].0;
        let hull_rb = current_bounds.last().unwrap().1;
        plane_written[d0] = Some((hull_lb, hull_rb));

        let mut diag_max = -f32::INFINITY;
        for &(lb, rb) in &current_bounds {
            for target_idx in lb..rb {
                let profile_idx = antidiagonal - target_idx;
                let residue = target.digital(target_idx);

                let match_value = log_sum(
                    log_sum(
                        cloud_matrix.get_match(d2, target_idx - 1)
                            + profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx - 1),
                        cloud_matrix.get_insert(d2, target_idx - 1)
                            + profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx - 1),
                    ),
                    log_sum(
                        cloud_matrix.get_delete(d2, target_idx - 1)
                            + profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx - 1),
                        begin_score(target_idx - 1) + profile.begin_to_match_score(profile_idx),
                    ),
                ) + profile.match_score(profile_idx, residue);

                let insert_value = if profile_idx < profile_length {
                    log_sum(
                        cloud_matrix.get_match(d1, target_idx - 1)
                            + profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                        cloud_matrix.get_insert(d1, target_idx - 1)
                            + profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                    ) + profile.insert_score(profile_idx, residue)
                } else {
                    -f32::INFINITY
                };

                let delete_value = log_sum(
                    cloud_matrix.get_match(d1, target_idx)
                        + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx - 1),
                    cloud_matrix.get_delete(d1, target_idx)
                        + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx - 1),
                );

                cloud_matrix.set_match(d0, target_idx, match_value);
                cloud_matrix.set_insert(d0, target_idx, insert_value);
                cloud_matrix.set_delete(d0, target_idx, delete_value);

                diag_max = diag_max.max(match_value).max(insert_value).max(delete_value);
            }
            scores.num_cells_computed += rb - lb;
            bounds.push(CloudBound::new(antidiagonal, lb, rb));
        }

        total_max = total_max.max(diag_max);
        if antidiagonal <= seed_end_antidiagonal {
            scores.inner_max_score = scores.inner_max_score.max(diag_max);
        }

        // the cloud has fallen irrecoverably behind the best path
        if diag_max < total_max - params.beta {
            break;
        }
        if scores.num_cells_computed > params.max_cells {
            scores.hit_cell_cap = true;
            break;
        }

        previous_diag_max = diag_max;
        previous_bounds = current_bounds;
    }

    scores.max_score = total_max;
    scores
}

/// Backward pruned sweep from the seed end toward the lattice origin.
pub fn cloud_search_backward(
    profile: &Profile,
    target: &Sequence,
    seed: &Seed,
    cloud_matrix: &mut CloudMatrixLinear,
    params: &CloudSearchParams,
    bounds: &mut CloudBoundGroup,
) -> CloudSearchScores {
    let target_length = target.length;
    let profile_length = profile.length;

    let seed_target_end = seed.target_end.clamp(1, target_length);
    let seed_profile_end = seed.profile_end.clamp(1, profile_length);
    let seed_start_antidiagonal =
        seed.target_start.clamp(1, target_length) + seed.profile_start.clamp(1, profile_length);

    let first_antidiagonal = seed_target_end + seed_profile_end;

    // exit values E(i) through the C tail; symmetric to the forward
    // sweep's N-only entry
    let c_loop = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_LOOP);
    let c_move = profile.special_transition_score(Profile::SPECIAL_C, Profile::SPECIAL_MOVE);
    let e_move = profile.special_transition_score(Profile::SPECIAL_E, Profile::SPECIAL_MOVE);
    let end_score =
        |target_idx: usize| e_move + c_move + (target_length - target_idx) as f32 * c_loop;

    let mut scores = CloudSearchScores::default();
    let mut total_max = -f32::INFINITY;
    let mut previous_diag_max = -f32::INFINITY;

    let mut previous_bounds: Vec<(usize, usize)> = vec![];
    let mut plane_written: [Option<(usize, usize)>; 3] = [None; 3];

    for (antidiagonal_count, antidiagonal) in (2..=first_antidiagonal).rev().enumerate() {
        let d0 = antidiagonal % 3;
        let d1 = (antidiagonal + 1) % 3;
        let d2 = (antidiagonal + 2) % 3;

        let mut current_bounds: Vec<(usize, usize)> = vec![];
        if antidiagonal_count == 0 {
            current_bounds.push((seed_target_end, seed_target_end + 1));
        } else {
            let prune = antidiagonal_count > params.gamma;
            let diag_limit = previous_diag_max - params.alpha;

            for &(lb, rb) in &previous_bounds {
                let trimmed = if prune {
                    trim_bound_by_xdrop(cloud_matrix, d1, lb, rb, diag_limit)
                } else {
                    Some((lb, rb))
                };
                let (lb, rb) = match trimmed {
                    Some(bound) => bound,
                    None => continue,
                };

                // the band widens one cell on each side, clipped to the
                // lattice; fresh edge cells exit through the E state
                let lb = (lb.saturating_sub(1))
                    .max(1)
                    .max(antidiagonal.saturating_sub(profile_length));
                let rb = (rb + 1).min(target_length + 1).min(antidiagonal);
                if lb < rb {
                    current_bounds.push((lb, rb));
                }
            }
        }

        if current_bounds.is_empty() {
            break;
        }

        if let Some((lb, rb)) = plane_written[d0].take() {
            cloud_matrix.scrub(d0, lb, rb);
        }
        let hull_lb = current_bounds[0].0;
        let hull_rb = current_bounds.last().unwrap().1;
        plane_written[d0] = Some((hull_lb, hull_rb));

        let mut diag_max = -f32::INFINITY;
        for &(lb, rb) in &current_bounds {
            for target_idx in lb..rb {
                let profile_idx = antidiagonal - target_idx;

                // suffix terms that need the next row's residue
                let mut next_match = -f32::INFINITY;
                let mut next_insert = -f32::INFINITY;
                if target_idx < target_length {
                    let next_residue = target.digital(target_idx + 1);
                    if profile_idx < profile_length {
                        next_match = cloud_matrix.get_match(d2, target_idx + 1)
                            + profile.match_score(profile_idx + 1, next_residue);
                    }
                    next_insert = cloud_matrix.get_insert(d1, target_idx + 1)
                        + profile.insert_score(profile_idx, next_residue);
                }
                let next_delete = cloud_matrix.get_delete(d1, target_idx);
                let end_value = end_score(target_idx);

                let match_value = log_sum(
                    log_sum(
                        next_match + profile.transition_score(Profile::MATCH_TO_MATCH, profile_idx),
                        next_insert
                            + profile.transition_score(Profile::MATCH_TO_INSERT, profile_idx),
                    ),
                    log_sum(
                        next_delete
                            + profile.transition_score(Profile::MATCH_TO_DELETE, profile_idx),
                        end_value,
                    ),
                );

                let insert_value = log_sum(
                    next_match + profile.transition_score(Profile::INSERT_TO_MATCH, profile_idx),
                    next_insert + profile.transition_score(Profile::INSERT_TO_INSERT, profile_idx),
                );

                let delete_value = log_sum(
                    log_sum(
                        next_match
                            + profile.transition_score(Profile::DELETE_TO_MATCH, profile_idx),
                        next_delete
                            + profile.transition_score(Profile::DELETE_TO_DELETE, profile_idx),
                    ),
                    end_value,
                );

                cloud_matrix.set_match(d0, target_idx, match_value);
                cloud_matrix.set_insert(d0, target_idx, insert_value);
                cloud_matrix.set_delete(d0, target_idx, delete_value);

                diag_max = diag_max.max(match_value).max(insert_value).max(delete_value);
            }
            scores.num_cells_computed += rb - lb;
            bounds.push(CloudBound::new(antidiagonal, lb, rb));
        }

        total_max = total_max.max(diag_max);
        if antidiagonal >= seed_start_antidiagonal {
            scores.inner_max_score = scores.inner_max_score.max(diag_max);
        }

        if diag_max < total_max - params.beta {
            break;
        }
        if scores.num_cells_computed > params.max_cells {
            scores.hit_cell_cap = true;
            break;
        }

        previous_diag_max = diag_max;
        previous_bounds = current_bounds;
    }

    // sweeps append in descending antidiagonal order
    bounds.bounds.reverse();

    scores.max_score = total_max;
    scores
}
