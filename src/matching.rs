//! Collaboration matching heuristic.
//!
//! A weighted sum over already-fetched profile data: shared skills dominate,
//! a matching profession and open-to-work status nudge the score, and
//! endorsement depth adds a small credibility term. Used to rank candidate
//! collaborators; the absolute value carries no meaning.

use std::collections::HashSet;

use crate::db::Profile;

const SKILL_OVERLAP_WEIGHT: f64 = 3.0;
const PROFESSION_MATCH_BONUS: f64 = 2.0;
const OPEN_TO_WORK_BONUS: f64 = 1.0;
const ENDORSEMENT_WEIGHT: f64 = 0.5;

/// Score how well `target` matches `viewer` as a collaborator.
#[must_use]
pub fn match_score(viewer: &Profile, target: &Profile, target_endorsements: i64) -> f64 {
    let viewer_skills: HashSet<String> = viewer
        .skills_vec()
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();
    let target_skills: HashSet<String> = target
        .skills_vec()
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();

    let overlap = viewer_skills.intersection(&target_skills).count() as f64;

    let mut score = overlap * SKILL_OVERLAP_WEIGHT;

    let professions_match = match (&viewer.profession, &target.profession) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if professions_match {
        score += PROFESSION_MATCH_BONUS;
    }

    if target.is_open_to_work {
        score += OPEN_TO_WORK_BONUS;
    }

    score + target_endorsements as f64 * ENDORSEMENT_WEIGHT
}
