//! Tweens and the intrusive lists that chain them.
//!
//! A tween animates one property of one target over one window. Tweens live
//! in the engine's `SlotMap<TweenId, Tween>`; their sibling and additive
//! chains are doubly linked through `Link`s stored on the tween itself, with
//! the list ends kept in a `ListHead` per property key.

use slotmap::SlotMap;

use crate::easing::Easing;
use crate::ids::{PropertyKey, TickableId, TweenId};
use crate::params::{Composition, Modifier};
use crate::value::ValueType;

/// Intrusive prev/next pointers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Link {
    pub prev: Option<TweenId>,
    pub next: Option<TweenId>,
}

/// Ends of an intrusive list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListHead {
    pub head: Option<TweenId>,
    pub tail: Option<TweenId>,
}

/// Which intrusive list an operation walks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// Replace-composition siblings on the same property.
    Sibling,
    /// Blend contributions on the same property.
    Additive,
}

#[derive(Clone, Debug)]
pub struct Tween {
    pub parent: TickableId,
    pub key: PropertyKey,
    pub value_type: ValueType,
    pub from_number: f64,
    pub to_number: f64,
    pub from_numbers: Vec<f64>,
    pub to_numbers: Vec<f64>,
    pub unit: Option<String>,
    pub strings: Vec<String>,
    /// Last composed value.
    pub number: f64,
    pub numbers: Vec<f64>,
    /// Change start relative to the parent's iteration time.
    pub start_time: f64,
    pub delay: f64,
    /// Declared duration; progress is measured against it.
    pub update_duration: f64,
    /// Rendered span; shorter than `update_duration` once overlapped.
    pub change_duration: f64,
    /// Start on the engine timeline, used to order siblings.
    pub absolute_start_time: f64,
    /// Local time at the last render, clamped to `[0, change_duration]`.
    pub current_time: f64,
    pub ease: Easing,
    pub composition: Composition,
    pub modifier: Option<Modifier>,
    pub is_overlapped: bool,
    pub is_overridden: bool,
    pub cancelled: bool,
    pub sibling: Link,
    pub additive: Link,
}

impl Tween {
    #[inline]
    pub fn absolute_end_time(&self) -> f64 {
        self.absolute_start_time + self.change_duration
    }

    /// Takes part in composition lookups.
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.cancelled && !self.is_overridden
    }

    #[inline]
    pub fn link(&self, kind: LinkKind) -> Link {
        match kind {
            LinkKind::Sibling => self.sibling,
            LinkKind::Additive => self.additive,
        }
    }

    #[inline]
    fn link_mut(&mut self, kind: LinkKind) -> &mut Link {
        match kind {
            LinkKind::Sibling => &mut self.sibling,
            LinkKind::Additive => &mut self.additive,
        }
    }
}

/// Insert `id` right after `after`, or at the head when `after` is `None`.
pub(crate) fn insert_after(
    tweens: &mut SlotMap<TweenId, Tween>,
    list: &mut ListHead,
    kind: LinkKind,
    id: TweenId,
    after: Option<TweenId>,
) {
    let next = match after {
        Some(a) => tweens.get(a).and_then(|t| t.link(kind).next),
        None => list.head,
    };
    if let Some(t) = tweens.get_mut(id) {
        *t.link_mut(kind) = Link { prev: after, next };
    }
    match after {
        Some(a) => {
            if let Some(t) = tweens.get_mut(a) {
                t.link_mut(kind).next = Some(id);
            }
        }
        None => list.head = Some(id),
    }
    match next {
        Some(n) => {
            if let Some(t) = tweens.get_mut(n) {
                t.link_mut(kind).prev = Some(id);
            }
        }
        None => list.tail = Some(id),
    }
}

/// Append `id` at the tail.
#[inline]
pub(crate) fn push_back(
    tweens: &mut SlotMap<TweenId, Tween>,
    list: &mut ListHead,
    kind: LinkKind,
    id: TweenId,
) {
    let tail = list.tail;
    insert_after(tweens, list, kind, id, tail);
}

/// Detach `id`, repairing its neighbours. Safe to call on an unlinked tween.
pub(crate) fn unlink(
    tweens: &mut SlotMap<TweenId, Tween>,
    list: &mut ListHead,
    kind: LinkKind,
    id: TweenId,
) {
    let Some(link) = tweens.get(id).map(|t| t.link(kind)) else {
        return;
    };
    let linked = link.prev.is_some() || link.next.is_some() || list.head == Some(id);
    if !linked {
        return;
    }
    match link.prev {
        Some(p) => {
            if let Some(t) = tweens.get_mut(p) {
                t.link_mut(kind).next = link.next;
            }
        }
        None => list.head = link.next,
    }
    match link.next {
        Some(n) => {
            if let Some(t) = tweens.get_mut(n) {
                t.link_mut(kind).prev = link.prev;
            }
        }
        None => list.tail = link.prev,
    }
    if let Some(t) = tweens.get_mut(id) {
        *t.link_mut(kind) = Link::default();
    }
}

/// Ids from head to tail.
pub(crate) fn collect(
    tweens: &SlotMap<TweenId, Tween>,
    list: &ListHead,
    kind: LinkKind,
) -> Vec<TweenId> {
    let mut out = Vec::new();
    let mut cursor = list.head;
    while let Some(id) = cursor {
        out.push(id);
        cursor = tweens.get(id).and_then(|t| t.link(kind).next);
    }
    out
}

/// Nearest live sibling before (`forward == false`) or after `id`.
pub(crate) fn live_neighbor(
    tweens: &SlotMap<TweenId, Tween>,
    id: TweenId,
    forward: bool,
) -> Option<TweenId> {
    let step = |t: &Tween| {
        if forward {
            t.sibling.next
        } else {
            t.sibling.prev
        }
    };
    let mut cursor = tweens.get(id).and_then(step);
    while let Some(c) = cursor {
        let t = tweens.get(c)?;
        if t.is_live() {
            return Some(c);
        }
        cursor = step(t);
    }
    None
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ids::TargetId;

    pub fn tween(parent: TickableId, abs_start: f64, duration: f64) -> Tween {
        Tween {
            parent,
            key: PropertyKey::new(TargetId(0), "x"),
            value_type: ValueType::Number,
            from_number: 0.0,
            to_number: 1.0,
            from_numbers: Vec::new(),
            to_numbers: Vec::new(),
            unit: None,
            strings: Vec::new(),
            number: 0.0,
            numbers: Vec::new(),
            start_time: 0.0,
            delay: 0.0,
            update_duration: duration,
            change_duration: duration,
            absolute_start_time: abs_start,
            current_time: 0.0,
            ease: Easing::Linear,
            composition: Composition::Replace,
            modifier: None,
            is_overlapped: false,
            is_overridden: false,
            cancelled: false,
            sibling: Link::default(),
            additive: Link::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::tween;
    use super::*;

    #[test]
    fn insert_unlink_keep_list_consistent() {
        let parent = TickableId::default();
        let mut tweens: SlotMap<TweenId, Tween> = SlotMap::with_key();
        let a = tweens.insert(tween(parent, 0.0, 10.0));
        let b = tweens.insert(tween(parent, 5.0, 10.0));
        let c = tweens.insert(tween(parent, 2.0, 10.0));
        let mut list = ListHead::default();
        push_back(&mut tweens, &mut list, LinkKind::Sibling, a);
        push_back(&mut tweens, &mut list, LinkKind::Sibling, b);
        insert_after(&mut tweens, &mut list, LinkKind::Sibling, c, Some(a));
        assert_eq!(collect(&tweens, &list, LinkKind::Sibling), vec![a, c, b]);

        unlink(&mut tweens, &mut list, LinkKind::Sibling, c);
        assert_eq!(collect(&tweens, &list, LinkKind::Sibling), vec![a, b]);
        unlink(&mut tweens, &mut list, LinkKind::Sibling, c);
        assert_eq!(collect(&tweens, &list, LinkKind::Sibling), vec![a, b]);

        unlink(&mut tweens, &mut list, LinkKind::Sibling, a);
        unlink(&mut tweens, &mut list, LinkKind::Sibling, b);
        assert_eq!(list, ListHead::default());
    }

    #[test]
    fn live_neighbor_skips_overridden() {
        let parent = TickableId::default();
        let mut tweens: SlotMap<TweenId, Tween> = SlotMap::with_key();
        let mut list = ListHead::default();
        let ids: Vec<TweenId> = (0..3)
            .map(|i| tweens.insert(tween(parent, i as f64, 1.0)))
            .collect();
        for id in &ids {
            push_back(&mut tweens, &mut list, LinkKind::Sibling, *id);
        }
        tweens[ids[1]].is_overridden = true;
        assert_eq!(live_neighbor(&tweens, ids[2], false), Some(ids[0]));
        assert_eq!(live_neighbor(&tweens, ids[0], true), Some(ids[2]));
        assert_eq!(live_neighbor(&tweens, ids[2], true), None);
    }
}
