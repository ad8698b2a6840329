//! Alternating Wall/TV clip selection.
//!
//! Each step picks one Wall clip and then one TV clip. A candidate is only
//! eligible when its animal differs from the animal of the clip picked right
//! before it, so two neighbouring clips never show the same animal. Steps
//! repeat until the probed durations reach the requested minimum.

use rand::Rng;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::catalog::{Catalog, Category, CategoryKind};
use crate::clip::{animal_of, Clip};
use crate::error::{ReelError, ReelResult};
use crate::probe::DurationProbe;

/// Order in which one selection step fills its slots
const STEP: [CategoryKind; 2] = [CategoryKind::Wall, CategoryKind::Tv];

/// A file that could fill the current slot
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub category: &'a Category,
    pub file: &'a str,
    pub animal: String,
}

impl Candidate<'_> {
    pub fn path(&self) -> PathBuf {
        self.category.clip_path(self.file)
    }
}

/// Every file of the given kind across all matching categories.
///
/// Fails with `MalformedFilename` as soon as one file has no animal token,
/// and with `SelectionExhausted` when any category of that kind is empty.
pub fn candidates(catalog: &Catalog, kind: CategoryKind) -> ReelResult<Vec<Candidate<'_>>> {
    let mut out = Vec::new();
    for category in catalog.of_kind(kind) {
        if category.files.is_empty() {
            debug!(path = %category.path.display(), %kind, "empty category");
            return Err(ReelError::SelectionExhausted {
                slot: kind.label(),
                excluded: None,
            });
        }
        for file in &category.files {
            out.push(Candidate {
                category,
                file,
                animal: animal_of(file)?,
            });
        }
    }
    Ok(out)
}

/// Choose uniformly among the candidates whose animal is not `previous`.
///
/// With no previous animal every candidate is eligible. An empty eligible set
/// is a `SelectionExhausted` error rather than a retry.
pub fn pick_candidate<'a, R>(
    rng: &mut R,
    candidates: Vec<Candidate<'a>>,
    kind: CategoryKind,
    previous: Option<&str>,
) -> ReelResult<Candidate<'a>>
where
    R: Rng + ?Sized,
{
    let mut eligible: Vec<Candidate<'a>> = candidates
        .into_iter()
        .filter(|c| previous != Some(c.animal.as_str()))
        .collect();

    if eligible.is_empty() {
        return Err(ReelError::SelectionExhausted {
            slot: kind.label(),
            excluded: previous.map(str::to_string),
        });
    }

    let idx = rng.gen_range(0..eligible.len());
    Ok(eligible.swap_remove(idx))
}

/// Ordered clips handed to the renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    clips: Vec<Clip>,
    total_duration: f64,
}

impl Sequence {
    pub fn push(&mut self, clip: Clip) {
        self.total_duration += clip.duration;
        self.clips.push(clip);
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Sum of every clip duration, added in sequence order
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Clip paths in render order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.clips.iter().map(|c| c.path.clone()).collect()
    }
}

/// Builds a [`Sequence`] from a catalog and a duration probe
pub struct SequenceBuilder<'a, P: DurationProbe + ?Sized> {
    catalog: &'a Catalog,
    probe: &'a P,
}

impl<'a, P: DurationProbe + ?Sized> SequenceBuilder<'a, P> {
    pub fn new(catalog: &'a Catalog, probe: &'a P) -> Self {
        Self { catalog, probe }
    }

    /// Pick clips until the total duration reaches `min_duration` seconds
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R, min_duration: f64) -> ReelResult<Sequence> {
        self.build_with_progress(rng, min_duration, |_| {})
    }

    /// Like [`build`](Self::build), calling `on_pick` after every clip.
    ///
    /// The threshold is only checked between steps, so the sequence always
    /// holds whole Wall+TV pairs.
    pub fn build_with_progress<R, F>(&self, rng: &mut R, min_duration: f64, mut on_pick: F) -> ReelResult<Sequence>
    where
        R: Rng + ?Sized,
        F: FnMut(&Clip),
    {
        let mut sequence = Sequence::default();
        let mut previous: Option<String> = None;

        while sequence.total_duration() < min_duration {
            for kind in STEP {
                let clip = self.pick(rng, kind, previous.as_deref())?;
                previous = Some(clip.animal.clone());
                on_pick(&clip);
                sequence.push(clip);
            }
        }

        info!(
            clips = sequence.len(),
            total_secs = sequence.total_duration(),
            min_secs = min_duration,
            "sequence complete"
        );
        Ok(sequence)
    }

    fn pick<R: Rng + ?Sized>(&self, rng: &mut R, kind: CategoryKind, previous: Option<&str>) -> ReelResult<Clip> {
        let pool = candidates(self.catalog, kind)?;
        let chosen = pick_candidate(rng, pool, kind, previous)?;
        let path = chosen.path();

        let duration = self.probe.probe(&path)?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ReelError::probe(path, format!("unusable duration {}", duration)));
        }
        debug!(%kind, animal = %chosen.animal, duration, path = %path.display(), "picked clip");

        Ok(Clip {
            path,
            kind,
            animal: chosen.animal,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::path::Path;

    fn catalog(walls: &[&[&str]], tv: &[&str]) -> Catalog {
        let mut categories: Vec<Category> = walls
            .iter()
            .enumerate()
            .map(|(i, files)| {
                Category::new(
                    format!("/assets/Wall {}", i),
                    CategoryKind::Wall,
                    files.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect();
        categories.push(Category::new(
            "/assets/TV",
            CategoryKind::Tv,
            tv.iter().map(|f| f.to_string()).collect(),
        ));
        Catalog::from_categories("/assets", categories)
    }

    /// Durations keyed off the file name so sums are easy to check
    fn probe_by_name(path: &Path) -> ReelResult<f64> {
        let name = path.file_name().unwrap().to_str().unwrap();
        Ok(match name.len() % 3 {
            0 => 2.5,
            1 => 4.0,
            _ => 7.25,
        })
    }

    fn mixed_catalog() -> Catalog {
        catalog(
            &[
                &["w_fox_1.mp4", "w_owl_2.mp4", "w_bat_3.mp4"],
                &["w_spider_10.mp4", "w_fox_11.mp4"],
            ],
            &["t_fox_1.mp4", "t_owl_22.mp4", "t_rat_333.mp4", "t_bat_4.mp4"],
        )
    }

    #[test]
    fn neighbours_never_share_an_animal() {
        let catalog = mixed_catalog();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let seq = SequenceBuilder::new(&catalog, &probe_by_name)
                .build(&mut rng, 60.0)
                .unwrap();
            for pair in seq.clips().windows(2) {
                assert_ne!(pair[0].animal, pair[1].animal, "seed {}", seed);
            }
        }
    }

    #[test]
    fn total_reaches_minimum_and_matches_sum() {
        let catalog = mixed_catalog();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let seq = SequenceBuilder::new(&catalog, &probe_by_name)
                .build(&mut rng, 45.0)
                .unwrap();
            assert!(seq.total_duration() >= 45.0);
            let sum = seq.clips().iter().fold(0.0, |acc, c| acc + c.duration);
            assert_eq!(seq.total_duration(), sum);
        }
    }

    #[test]
    fn clips_come_in_wall_tv_pairs() {
        let catalog = mixed_catalog();
        let mut rng = StdRng::seed_from_u64(7);
        let seq = SequenceBuilder::new(&catalog, &probe_by_name)
            .build(&mut rng, 30.0)
            .unwrap();

        assert_eq!(seq.len() % 2, 0);
        for pair in seq.clips().chunks(2) {
            assert_eq!(pair[0].kind, CategoryKind::Wall);
            assert_eq!(pair[1].kind, CategoryKind::Tv);
        }
    }

    #[test]
    fn stops_after_the_pair_that_crosses_the_threshold() {
        let catalog = mixed_catalog();
        let probe = |_: &Path| -> ReelResult<f64> { Ok(10.0) };
        let mut rng = StdRng::seed_from_u64(1);

        // 25s needs two pairs: 20s after the first, 40s after the second
        let seq = SequenceBuilder::new(&catalog, &probe).build(&mut rng, 25.0).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.total_duration(), 40.0);
    }

    #[test]
    fn zero_minimum_picks_nothing() {
        let catalog = mixed_catalog();
        let mut rng = StdRng::seed_from_u64(3);
        let seq = SequenceBuilder::new(&catalog, &probe_by_name)
            .build(&mut rng, 0.0)
            .unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.total_duration(), 0.0);
    }

    #[test]
    fn fox_wall_then_only_owl_tv() {
        let catalog = catalog(&[&["a_fox_1.mp4", "b_fox_2.mp4"]], &["c_owl_1.mp4"]);
        let probe = |_: &Path| -> ReelResult<f64> { Ok(5.0) };

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let seq = SequenceBuilder::new(&catalog, &probe).build(&mut rng, 20.0).unwrap();
            assert_eq!(seq.len(), 4);
            for pair in seq.clips().chunks(2) {
                assert_eq!(pair[0].animal, "fox");
                assert_eq!(pair[1].path, Path::new("/assets/TV/c_owl_1.mp4"));
            }
        }
    }

    #[test]
    fn owl_exclusion_leaves_both_fox_walls_eligible() {
        let catalog = catalog(&[&["a_fox_1.mp4", "b_fox_2.mp4"]], &["c_owl_1.mp4"]);
        let pool = candidates(&catalog, CategoryKind::Wall).unwrap();
        let mut seen = std::collections::HashSet::new();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..64 {
            let pick = pick_candidate(&mut rng, pool.clone(), CategoryKind::Wall, Some("owl")).unwrap();
            seen.insert(pick.file.to_string());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn single_animal_everywhere_exhausts_on_first_tv_pick() {
        let catalog = catalog(&[&["a_fox_1.mp4", "b_fox_2.mp4"]], &["c_fox_1.mp4", "d_fox_2.mp4"]);
        let probes = Cell::new(0);
        let probe = |_: &Path| -> ReelResult<f64> {
            probes.set(probes.get() + 1);
            Ok(3.0)
        };
        let mut picked = Vec::new();
        let mut rng = StdRng::seed_from_u64(5);

        let err = SequenceBuilder::new(&catalog, &probe)
            .build_with_progress(&mut rng, 10.0, |clip| picked.push(clip.kind))
            .unwrap_err();

        match err {
            ReelError::SelectionExhausted { slot, excluded } => {
                assert_eq!(slot, "TV");
                assert_eq!(excluded.as_deref(), Some("fox"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(picked, vec![CategoryKind::Wall]);
        assert_eq!(probes.get(), 1);
    }

    #[test]
    fn empty_pool_is_exhausted_without_previous() {
        let catalog = catalog(&[], &["c_owl_1.mp4"]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe_by_name)
            .build(&mut rng, 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            ReelError::SelectionExhausted { slot: "wall", excluded: None }
        ));
    }

    #[test]
    fn empty_wall_category_fails_even_beside_full_ones() {
        let catalog = catalog(&[&[], &["w_fox_1.mp4"]], &["t_owl_1.mp4"]);
        let mut picked = 0;
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe_by_name)
            .build_with_progress(&mut rng, 10.0, |_| picked += 1)
            .unwrap_err();
        assert!(matches!(
            err,
            ReelError::SelectionExhausted { slot: "wall", excluded: None }
        ));
        assert_eq!(picked, 0);
    }

    #[test]
    fn empty_tv_category_fails_the_first_tv_pick() {
        let catalog = catalog(&[&["w_fox_1.mp4", "w_owl_2.mp4"]], &[]);
        let mut picked = Vec::new();
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe_by_name)
            .build_with_progress(&mut rng, 10.0, |clip| picked.push(clip.kind))
            .unwrap_err();
        assert!(matches!(
            err,
            ReelError::SelectionExhausted { slot: "TV", excluded: None }
        ));
        assert_eq!(picked, vec![CategoryKind::Wall]);
    }

    #[test]
    fn malformed_name_in_pool_fails_the_pick() {
        let catalog = catalog(&[&["a_fox_1.mp4", "readme.txt"]], &["c_owl_1.mp4"]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe_by_name)
            .build(&mut rng, 1.0)
            .unwrap_err();
        assert!(matches!(err, ReelError::MalformedFilename(ref n) if n == "readme.txt"));
    }

    #[test]
    fn probe_failure_aborts_the_build() {
        let catalog = mixed_catalog();
        let probe = |p: &Path| -> ReelResult<f64> { Err(ReelError::probe(p, "corrupt")) };
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe).build(&mut rng, 1.0).unwrap_err();
        assert!(matches!(err, ReelError::Probe { .. }));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let catalog = mixed_catalog();
        let probe = |_: &Path| -> ReelResult<f64> { Ok(0.0) };
        let mut rng = StdRng::seed_from_u64(0);
        let err = SequenceBuilder::new(&catalog, &probe).build(&mut rng, 1.0).unwrap_err();
        assert!(matches!(err, ReelError::Probe { .. }));
    }

    #[test]
    fn same_seed_same_sequence() {
        let catalog = mixed_catalog();
        let build = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            SequenceBuilder::new(&catalog, &probe_by_name)
                .build(&mut rng, 40.0)
                .unwrap()
                .paths()
        };
        assert_eq!(build(42), build(42));
    }
}
