//! Selección determinista del mejor candidato para una pista.

use crate::models::MatchResult;
use tracing::debug;

/// Distancia máxima permitida entre la pista y un candidato, en ms.
pub const DURATION_TOLERANCE_MS: u64 = 15_000;

const BASE_SCORE: f64 = 100.0;
const BOUNDARY_PENALTY: f64 = 50.0;
const BONUS: f64 = 10.0;
const PENALTY: f64 = 20.0;

const BONUS_TERMS: [&str; 3] = ["official", "audio", "music video"];
const PENALTY_TERMS: [&str; 6] = ["cover", "remix", "live", "karaoke", "instrumental", "lyrics"];

/// Un video candidato tal como lo devuelve cualquier proveedor.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub video_id: String,
    pub title: String,
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    pub channel_title: Option<String>,
}

impl From<Candidate> for MatchResult {
    fn from(c: Candidate) -> Self {
        MatchResult {
            video_id: c.video_id,
            title: c.title,
            duration_ms: c.duration_ms,
            thumbnail_url: c.thumbnail_url,
            channel_title: c.channel_title,
        }
    }
}

/// Puntúa un candidato, o `None` si queda fuera de la tolerancia.
pub fn candidate_score(
    candidate: &Candidate,
    target_duration_ms: u64,
    track_name: &str,
    artist_name: &str,
) -> Option<f64> {
    let diff = candidate.duration_ms.abs_diff(target_duration_ms);
    if diff > DURATION_TOLERANCE_MS {
        return None;
    }

    let mut score = BASE_SCORE - (diff as f64 / DURATION_TOLERANCE_MS as f64) * BOUNDARY_PENALTY;

    let title = candidate.title.to_lowercase();
    let track = track_name.to_lowercase();
    let artist = artist_name.to_lowercase();

    let bonuses = [track.as_str(), artist.as_str()]
        .into_iter()
        .chain(BONUS_TERMS)
        .filter(|term| title.contains(term))
        .count();
    let penalties = PENALTY_TERMS
        .into_iter()
        .filter(|term| title.contains(term))
        .count();

    score += bonuses as f64 * BONUS;
    score -= penalties as f64 * PENALTY;
    Some(score)
}

/// Elige el candidato con la puntuación estrictamente más alta.
///
/// En un empate gana el primero. El mejor parte de cero, así que un candidato
/// que las penalizaciones dejan en cero o menos nunca se devuelve.
pub fn score(
    candidates: &[Candidate],
    target_duration_ms: u64,
    track_name: &str,
    artist_name: &str,
) -> Option<MatchResult> {
    let mut best: Option<&Candidate> = None;
    let mut best_score = 0.0;

    for candidate in candidates {
        let Some(s) = candidate_score(candidate, target_duration_ms, track_name, artist_name)
        else {
            debug!(
                "Candidato {} fuera de tolerancia ({} ms vs {} ms)",
                candidate.video_id, candidate.duration_ms, target_duration_ms
            );
            continue;
        };

        debug!("Candidato {} '{}' puntuó {:.1}", candidate.video_id, candidate.title, s);
        if s > best_score {
            best_score = s;
            best = Some(candidate);
        }
    }

    best.cloned().map(MatchResult::from)
}
