//! Cross-animation composition.
//!
//! `Replace` tweens on the same property form a sibling chain sorted by
//! absolute start time. A newer tween overrides every later sibling and
//! truncates the one before it so only one tween drives the property at a
//! time. `Blend` tweens instead push onto an additive chain: each stores its
//! offset from a running target, and the additive pass sums the offsets onto
//! that target once per frame.

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::config::MIN_VALUE;
use crate::engine::Engine;
use crate::ids::{PropertyKey, TickableId, TweenId};
use crate::interp::functions::round_to;
use crate::interp::recompose;
use crate::outputs::Change;
use crate::params::Composition;
use crate::timer::Tickable;
use crate::tween::{
    collect, insert_after, live_neighbor, push_back, unlink, LinkKind, ListHead, Tween,
};
use crate::value::ValueType;

/// Running base value and contribution chain for one blended property.
#[derive(Clone, Debug)]
pub struct AdditiveLookup {
    pub value_type: ValueType,
    /// Value the blend offsets are summed onto; moves to each new tween's `to`.
    pub target_number: f64,
    pub target_numbers: Vec<f64>,
    pub unit: Option<String>,
    pub strings: Vec<String>,
    pub chain: ListHead,
}

#[derive(Debug, Default)]
pub struct Compositor {
    chains: HashMap<PropertyKey, ListHead>,
    lookups: IndexMap<PropertyKey, AdditiveLookup>,
}

/// Silence a tween for good; it keeps its slot until its parent is freed.
pub(crate) fn override_tween(tween: &mut Tween) {
    tween.is_overridden = true;
    tween.is_overlapped = true;
    tween.change_duration = MIN_VALUE;
    tween.current_time = MIN_VALUE;
}

impl Compositor {
    /// Sibling ids on `key`, head to tail.
    pub fn siblings(&self, tweens: &SlotMap<TweenId, Tween>, key: &PropertyKey) -> Vec<TweenId> {
        self.chains
            .get(key)
            .map(|list| collect(tweens, list, LinkKind::Sibling))
            .unwrap_or_default()
    }

    /// Blend contributions on `key`, oldest first.
    pub fn additive(&self, tweens: &SlotMap<TweenId, Tween>, key: &PropertyKey) -> Vec<TweenId> {
        self.lookups
            .get(key)
            .map(|lookup| collect(tweens, &lookup.chain, LinkKind::Additive))
            .unwrap_or_default()
    }

    pub fn lookup(&self, key: &PropertyKey) -> Option<&AdditiveLookup> {
        self.lookups.get(key)
    }

    /// Last live sibling starting at or before `absolute_start`.
    pub(crate) fn predecessor(
        &self,
        tweens: &SlotMap<TweenId, Tween>,
        key: &PropertyKey,
        absolute_start: f64,
    ) -> Option<TweenId> {
        let list = self.chains.get(key)?;
        let mut found = None;
        let mut cursor = list.head;
        while let Some(id) = cursor {
            let tween = tweens.get(id)?;
            if tween.absolute_start_time > absolute_start {
                break;
            }
            if tween.is_live() {
                found = Some(id);
            }
            cursor = tween.sibling.next;
        }
        found
    }

    /// Override every live sibling starting after `absolute_start`. Returns
    /// their parents so the caller can cancel fully-overridden ones.
    pub(crate) fn override_later(
        &self,
        tweens: &mut SlotMap<TweenId, Tween>,
        key: &PropertyKey,
        absolute_start: f64,
    ) -> Vec<TickableId> {
        let Some(list) = self.chains.get(key) else {
            return Vec::new();
        };
        let mut parents = Vec::new();
        let mut cursor = list.head;
        while let Some(id) = cursor {
            let Some(tween) = tweens.get_mut(id) else {
                break;
            };
            cursor = tween.sibling.next;
            if tween.is_live() && tween.absolute_start_time > absolute_start {
                override_tween(tween);
                parents.push(tween.parent);
            }
        }
        parents
    }

    /// Link a new tween into its property's chain. Returns the parents whose
    /// tweens were truncated or overridden.
    pub(crate) fn compose(
        &mut self,
        tweens: &mut SlotMap<TweenId, Tween>,
        tickables: &SlotMap<TickableId, Tickable>,
        id: TweenId,
    ) -> Vec<TickableId> {
        let Some(tween) = tweens.get(id) else {
            return Vec::new();
        };
        match tween.composition {
            Composition::None => Vec::new(),
            Composition::Replace => self.compose_replace(tweens, tickables, id),
            Composition::Blend => {
                self.compose_blend(tweens, id);
                Vec::new()
            }
        }
    }

    /// Relink a revived tween. Blend offsets were converted at creation and
    /// are only pushed back onto their chain.
    pub(crate) fn relink(
        &mut self,
        tweens: &mut SlotMap<TweenId, Tween>,
        tickables: &SlotMap<TickableId, Tickable>,
        id: TweenId,
    ) -> Vec<TickableId> {
        let Some(tween) = tweens.get(id) else {
            return Vec::new();
        };
        match tween.composition {
            Composition::None => Vec::new(),
            Composition::Replace => self.compose_replace(tweens, tickables, id),
            Composition::Blend => {
                let key = tween.key.clone();
                if let Some(lookup) = self.lookups.get_mut(&key) {
                    push_back(tweens, &mut lookup.chain, LinkKind::Additive, id);
                }
                Vec::new()
            }
        }
    }

    /// Remove a tween from whichever chain holds it.
    pub(crate) fn detach(&mut self, tweens: &mut SlotMap<TweenId, Tween>, id: TweenId) {
        let Some(tween) = tweens.get(id) else {
            return;
        };
        let key = tween.key.clone();
        match tween.composition {
            Composition::None => {}
            Composition::Replace => {
                if let Some(list) = self.chains.get_mut(&key) {
                    unlink(tweens, list, LinkKind::Sibling, id);
                    if list.head.is_none() {
                        self.chains.remove(&key);
                    }
                }
            }
            Composition::Blend => {
                if let Some(lookup) = self.lookups.get_mut(&key) {
                    unlink(tweens, &mut lookup.chain, LinkKind::Additive, id);
                }
            }
        }
    }

    fn compose_replace(
        &mut self,
        tweens: &mut SlotMap<TweenId, Tween>,
        tickables: &SlotMap<TickableId, Tickable>,
        id: TweenId,
    ) -> Vec<TickableId> {
        let Some(tween) = tweens.get(id) else {
            return Vec::new();
        };
        let key = tween.key.clone();
        let parent = tween.parent;
        let absolute_start = tween.absolute_start_time;
        let delay = tween.delay;

        // Sorted insert: walk back from the tail past later starts.
        let list = self.chains.entry(key).or_default();
        let mut after = list.tail;
        while let Some(a) = after {
            match tweens.get(a) {
                Some(t) if t.absolute_start_time > absolute_start => after = t.sibling.prev,
                _ => break,
            }
        }
        insert_after(tweens, list, LinkKind::Sibling, id, after);

        let mut touched = Vec::new();
        let Some(prev_id) = live_neighbor(tweens, id, false) else {
            return touched;
        };
        let Some(prev) = tweens.get(prev_id) else {
            return touched;
        };
        let prev_parent = prev.parent;
        let prev_abs_end = prev.absolute_end_time();
        let prev_abs_start = prev.absolute_start_time;
        let prev_change = prev.change_duration;

        // A looping predecessor from another animation would come back after
        // its first pass; drop it and its earlier siblings from that parent.
        let looped_overlap = prev_parent != parent
            && tickables.get(prev_parent).is_some_and(|t| {
                t.state.iteration_count > 1.0
                    && prev_abs_end + (t.state.duration - t.state.iteration_duration)
                        > absolute_start
            });
        if looped_overlap {
            let mut cursor = Some(prev_id);
            while let Some(c) = cursor {
                let Some(t) = tweens.get_mut(c) else {
                    break;
                };
                if t.parent != prev_parent {
                    break;
                }
                cursor = t.sibling.prev;
                if t.is_live() {
                    override_tween(t);
                }
            }
            touched.push(prev_parent);
            trace!(?prev_id, "looping predecessor overridden");
            return touched;
        }

        if prev_abs_end > absolute_start - delay {
            // Cut the predecessor off where the new tween starts changing. Any
            // delay the new tween keeps is held by the predecessor.
            let change = round_to(absolute_start - prev_abs_start, 12).min(prev_change);
            if let Some(prev) = tweens.get_mut(prev_id) {
                prev.change_duration = change;
                prev.current_time = change;
                prev.is_overlapped = true;
                if change < MIN_VALUE {
                    override_tween(prev);
                }
            }
            touched.push(prev_parent);
        }
        touched
    }

    fn compose_blend(&mut self, tweens: &mut SlotMap<TweenId, Tween>, id: TweenId) {
        let Some(tween) = tweens.get_mut(id) else {
            return;
        };
        let lookup = self
            .lookups
            .entry(tween.key.clone())
            .or_insert_with(|| AdditiveLookup {
                value_type: tween.value_type,
                target_number: tween.from_number,
                target_numbers: tween.from_numbers.clone(),
                unit: tween.unit.clone(),
                strings: tween.strings.clone(),
                chain: ListHead::default(),
            });

        let to = tween.to_number;
        tween.from_number = lookup.target_number - to;
        tween.to_number = 0.0;
        tween.number = 0.0;
        lookup.target_number = to;

        if !tween.to_numbers.is_empty() {
            let to_numbers = std::mem::take(&mut tween.to_numbers);
            tween.from_numbers = to_numbers
                .iter()
                .enumerate()
                .map(|(i, v)| lookup.target_numbers.get(i).copied().unwrap_or(0.0) - v)
                .collect();
            tween.to_numbers = vec![0.0; to_numbers.len()];
            tween.numbers = vec![0.0; to_numbers.len()];
            lookup.target_numbers = to_numbers;
        }
        let chain = &mut lookup.chain;
        push_back(tweens, chain, LinkKind::Additive, id);
    }
}

impl Engine {
    /// Sum blend contributions onto their running targets and write the
    /// results. Lookups whose every tween has been freed are dropped.
    pub(crate) fn additive_pass(&mut self) {
        let precision = self.cfg.precision;
        self.compositor
            .lookups
            .retain(|_, lookup| lookup.chain.head.is_some());
        let Engine {
            compositor,
            tweens,
            io,
            outputs,
            ..
        } = self;
        for (key, lookup) in compositor.lookups.iter() {
            let mut live = false;
            let mut number = lookup.target_number;
            let mut numbers = lookup.target_numbers.clone();
            let mut cursor = lookup.chain.head;
            while let Some(id) = cursor {
                let Some(tween) = tweens.get(id) else {
                    break;
                };
                cursor = tween.additive.next;
                if tween.cancelled {
                    continue;
                }
                live = true;
                number += tween.number;
                for (sum, n) in numbers.iter_mut().zip(&tween.numbers) {
                    *sum += n;
                }
            }
            if !live {
                continue;
            }
            let value = recompose(
                lookup.value_type,
                number,
                &numbers,
                lookup.unit.as_deref(),
                &lookup.strings,
                precision,
            );
            io.write(key.target, &key.property, &value);
            outputs.push_change(Change {
                tickable: None,
                target: key.target,
                property: key.property.clone(),
                value,
            });
        }
    }

    /// Cancel every listed parent whose tweens have all been overridden.
    pub(crate) fn cancel_overridden_parents(&mut self, parents: Vec<TickableId>) {
        let mut seen = HashSet::new();
        for parent in parents {
            if !seen.insert(parent) {
                continue;
            }
            let Some(tickable) = self.tickables.get(parent) else {
                continue;
            };
            if tickable.state.cancelled || tickable.tweens.is_empty() {
                continue;
            }
            let all_overridden = tickable
                .tweens
                .iter()
                .all(|id| self.tweens.get(*id).map_or(true, |t| t.is_overridden));
            if all_overridden {
                trace!(?parent, "every tween overridden; cancelling");
                if let Err(err) = self.cancel(parent) {
                    debug!(?err, "cancel of overridden parent failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tween::test_support::tween;

    fn setup(starts: &[(f64, f64)]) -> (SlotMap<TweenId, Tween>, Vec<TweenId>) {
        let mut tweens: SlotMap<TweenId, Tween> = SlotMap::with_key();
        let parent = TickableId::default();
        let ids = starts
            .iter()
            .map(|(s, d)| tweens.insert(tween(parent, *s, *d)))
            .collect();
        (tweens, ids)
    }

    #[test]
    fn chain_stays_sorted_by_absolute_start() {
        let (mut tweens, ids) = setup(&[(0.0, 100.0), (500.0, 100.0), (250.0, 100.0)]);
        let mut compositor = Compositor::default();
        let tickables = SlotMap::with_key();
        for id in &ids {
            compositor.compose(&mut tweens, &tickables, *id);
        }
        let key = tweens[ids[0]].key.clone();
        assert_eq!(
            compositor.siblings(&tweens, &key),
            vec![ids[0], ids[2], ids[1]]
        );
    }

    #[test]
    fn overlapping_predecessor_is_truncated() {
        let (mut tweens, ids) = setup(&[(0.0, 1000.0), (400.0, 1000.0)]);
        tweens[ids[1]].start_time = 400.0;
        let mut compositor = Compositor::default();
        let tickables = SlotMap::with_key();
        compositor.compose(&mut tweens, &tickables, ids[0]);
        compositor.compose(&mut tweens, &tickables, ids[1]);
        let first = &tweens[ids[0]];
        assert!(first.is_overlapped);
        assert_eq!(first.change_duration, 400.0);
        assert!(!first.is_overridden);
    }

    #[test]
    fn delayed_successor_truncates_at_its_own_start() {
        let (mut tweens, ids) = setup(&[(0.0, 1000.0), (700.0, 1000.0)]);
        tweens[ids[1]].delay = 300.0;
        let mut compositor = Compositor::default();
        let tickables = SlotMap::with_key();
        compositor.compose(&mut tweens, &tickables, ids[0]);
        compositor.compose(&mut tweens, &tickables, ids[1]);
        assert_eq!(tweens[ids[0]].change_duration, 700.0);
        assert!(!tweens[ids[0]].is_overridden);
        assert_eq!(
            tweens[ids[0]].absolute_end_time(),
            tweens[ids[1]].absolute_start_time
        );
    }

    #[test]
    fn predecessor_and_override_later_skip_dead_tweens() {
        let (mut tweens, ids) = setup(&[(0.0, 100.0), (100.0, 100.0), (300.0, 100.0)]);
        let mut compositor = Compositor::default();
        let tickables = SlotMap::with_key();
        for id in &ids {
            compositor.compose(&mut tweens, &tickables, *id);
        }
        let key = tweens[ids[0]].key.clone();
        tweens[ids[1]].cancelled = true;
        assert_eq!(compositor.predecessor(&tweens, &key, 150.0), Some(ids[0]));

        let parents = compositor.override_later(&mut tweens, &key, 150.0);
        assert_eq!(parents.len(), 1);
        assert!(tweens[ids[2]].is_overridden);
        assert_eq!(tweens[ids[2]].change_duration, MIN_VALUE);
        assert!(!tweens[ids[1]].is_overridden);
    }

    #[test]
    fn blend_converts_to_offsets_from_running_target() {
        let (mut tweens, ids) = setup(&[(0.0, 100.0), (0.0, 100.0)]);
        for (id, to) in ids.iter().zip([50.0, 80.0]) {
            let t = &mut tweens[*id];
            t.composition = Composition::Blend;
            t.from_number = 10.0;
            t.to_number = to;
        }
        let mut compositor = Compositor::default();
        let tickables = SlotMap::with_key();
        for id in &ids {
            compositor.compose(&mut tweens, &tickables, *id);
        }
        let key = tweens[ids[0]].key.clone();
        assert_eq!(tweens[ids[0]].from_number, 10.0 - 50.0);
        assert_eq!(tweens[ids[1]].from_number, 50.0 - 80.0);
        assert_eq!(compositor.lookup(&key).map(|l| l.target_number), Some(80.0));
        assert_eq!(compositor.additive(&tweens, &key), ids);

        compositor.detach(&mut tweens, ids[0]);
        assert_eq!(compositor.additive(&tweens, &key), vec![ids[1]]);
    }
}
