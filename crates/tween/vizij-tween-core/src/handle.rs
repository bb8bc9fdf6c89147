//! Application-facing handles.
//!
//! `EngineHandle` owns the engine behind `Rc<RefCell<_>>` and is what hosts
//! pass around. `Timer` is a cheap handle to one timer or animation; when
//! every clone of it is dropped the engine frees the slot once the timer is
//! no longer running. `Completion` is the future returned by `then()`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::binding::ValueIo;
use crate::clock::TimeSource;
use crate::config::Config;
use crate::easing::Easing;
use crate::engine::{Engine, ReleaseQueue};
use crate::error::TweenError;
use crate::frame::FrameSource;
use crate::ids::{TargetId, TickableId};
use crate::outputs::Outputs;
use crate::params::{AnimationParams, TimerParams, TweenParams};
use crate::timer::TimerView;
use crate::value::{RawValue, Value};
use crate::Result;
use tracing::trace;

#[derive(Debug, Default)]
pub(crate) struct CompletionState {
    view: Option<TimerView>,
    waker: Option<Waker>,
}

pub(crate) type CompletionSlot = Rc<RefCell<CompletionState>>;

/// Resolves with the timer's final state on natural completion.
#[derive(Debug)]
pub struct Completion {
    slot: CompletionSlot,
}

impl Completion {
    pub(crate) fn pending() -> (Self, CompletionSlot) {
        let slot = CompletionSlot::default();
        (
            Self {
                slot: Rc::clone(&slot),
            },
            slot,
        )
    }

    pub(crate) fn ready(view: TimerView) -> Self {
        let (completion, slot) = Self::pending();
        resolve(&slot, view);
        completion
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().view.is_some()
    }

    /// Resolved state without awaiting.
    pub fn peek(&self) -> Option<TimerView> {
        self.slot.borrow().view.clone()
    }
}

/// Resolve at most once; later calls are ignored.
pub(crate) fn resolve(slot: &CompletionSlot, view: TimerView) {
    let waker = {
        let mut state = slot.borrow_mut();
        if state.view.is_some() {
            return;
        }
        state.view = Some(view);
        state.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

impl Future for Completion {
    type Output = TimerView;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TimerView> {
        let mut state = self.slot.borrow_mut();
        match &state.view {
            Some(view) => Poll::Ready(view.clone()),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Playback call made while the engine was borrowed by a render.
type Deferred = Box<dyn FnOnce(&mut Engine)>;

/// Shared, single-threaded engine handle.
///
/// Callbacks run while the engine is borrowed. `Timer` playback calls made
/// from inside one are queued and run, in order, as soon as the outer call
/// returns; `Timer` getters return `Err(EngineBusy)` instead.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Rc<RefCell<Engine>>,
    deferred: Rc<RefCell<VecDeque<Deferred>>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine)
            .field("deferred", &self.deferred.borrow().len())
            .finish()
    }
}

impl EngineHandle {
    pub fn new(cfg: Config) -> Self {
        Self::from_engine(Engine::new(cfg))
    }

    pub fn with_parts(
        cfg: Config,
        io: Box<dyn ValueIo>,
        time: Box<dyn TimeSource>,
        frames: Box<dyn FrameSource>,
    ) -> Self {
        Self::from_engine(Engine::with_parts(cfg, io, time, frames))
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Rc::new(RefCell::new(engine)),
            deferred: Rc::default(),
        }
    }

    /// Borrow the engine. Must not be called from inside a callback; use
    /// `Timer` methods there.
    pub fn with<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        f(&self.engine.borrow())
    }

    /// Borrow the engine mutably, then run any playback calls queued by
    /// callbacks meanwhile. Must not be called from inside a callback.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let out = f(&mut self.engine.borrow_mut());
        self.run_deferred();
        out
    }

    fn try_with<R>(&self, f: impl FnOnce(&Engine) -> Result<R>) -> Result<R> {
        let engine = self.engine.try_borrow().map_err(|_| TweenError::EngineBusy)?;
        f(&engine)
    }

    /// Run `f` now, or queue it when a render is in progress.
    fn run_or_defer(&self, f: impl FnOnce(&mut Engine) + 'static) {
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => {
                f(&mut engine);
                drop(engine);
                self.run_deferred();
            }
            Err(_) => {
                trace!("engine busy; deferring playback call");
                self.deferred.borrow_mut().push_back(Box::new(f));
            }
        }
    }

    fn run_deferred(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some(f) = next else {
                break;
            };
            f(&mut self.engine.borrow_mut());
        }
    }

    fn timer(&self, id: TickableId) -> Timer {
        let queue = self.with(|e| e.release_queue());
        Timer {
            id,
            engine: self.clone(),
            guard: Rc::new(ReleaseGuard { id, queue }),
        }
    }

    pub fn create_timer(&self, params: TimerParams) -> Timer {
        let id = self.with_mut(|e| e.create_timer(params));
        self.timer(id)
    }

    pub fn create_animation(&self, targets: &[TargetId], params: AnimationParams) -> Timer {
        let id = self.with_mut(|e| e.create_animation(targets, params));
        self.timer(id)
    }

    pub fn update(&self) -> Outputs {
        self.with_mut(|e| e.update().clone())
    }

    pub fn update_at(&self, time: f64) -> Outputs {
        self.with_mut(|e| e.update_at(time).clone())
    }

    pub fn tick_frame(&self) -> Outputs {
        self.with_mut(|e| e.tick_frame().clone())
    }

    pub fn take_outputs(&self) -> Outputs {
        self.with_mut(Engine::take_outputs)
    }

    pub fn begin_frame(&self, time: f64) -> Result<()> {
        self.with_mut(|e| e.begin_frame(time))
    }

    pub fn end_frame(&self) -> Result<Outputs> {
        self.with_mut(|e| e.end_frame().map(Outputs::clone))
    }

    pub fn pause(&self) {
        self.with_mut(Engine::pause_all);
    }

    pub fn resume(&self) {
        self.with_mut(Engine::resume_all);
    }

    pub fn set_speed(&self, speed: f64) {
        self.with_mut(|e| e.set_speed(speed));
    }

    pub fn set_fps(&self, fps: f64) {
        self.with_mut(|e| e.set_fps(fps));
    }

    /// Current value of a property through the engine's `ValueIo`.
    pub fn read(&self, target: TargetId, property: &str) -> Option<Value> {
        self.with(|e| e.io.read(target, property))
    }
}

#[derive(Debug)]
struct ReleaseGuard {
    id: TickableId,
    queue: ReleaseQueue,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.queue.borrow_mut().push(self.id);
    }
}

/// Handle to a timer or animation. Playback calls on a freed timer are
/// logged and ignored; getters return `Err(TickableNotFound)`.
#[derive(Clone, Debug)]
pub struct Timer {
    id: TickableId,
    engine: EngineHandle,
    guard: Rc<ReleaseGuard>,
}

impl Timer {
    #[inline]
    pub fn id(&self) -> TickableId {
        self.id
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    fn control(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Engine, TickableId) -> Result<()> + 'static,
    ) -> &Self {
        let id = self.id;
        self.engine.run_or_defer(move |e| {
            if let Err(err) = f(e, id) {
                e.log_missing(op, &err);
            }
        });
        self
    }

    pub fn play(&self) -> &Self {
        self.control("play", Engine::play)
    }

    pub fn pause(&self) -> &Self {
        self.control("pause", Engine::pause)
    }

    pub fn resume(&self) -> &Self {
        self.control("resume", Engine::resume)
    }

    pub fn reverse(&self) -> &Self {
        self.control("reverse", Engine::reverse)
    }

    pub fn alternate(&self) -> &Self {
        self.control("alternate", Engine::alternate)
    }

    pub fn restart(&self) -> &Self {
        self.control("restart", Engine::restart)
    }

    pub fn reset(&self) -> &Self {
        self.control("reset", Engine::reset)
    }

    pub fn complete(&self) -> &Self {
        self.control("complete", Engine::complete)
    }

    pub fn cancel(&self) -> &Self {
        self.control("cancel", Engine::cancel)
    }

    pub fn revert(&self) -> &Self {
        self.control("revert", Engine::revert)
    }

    pub fn seek(&self, time: f64) -> &Self {
        self.control("seek", move |e, id| e.seek(id, time, false))
    }

    /// Seek without firing callbacks.
    pub fn seek_muted(&self, time: f64) -> &Self {
        self.control("seek", move |e, id| e.seek(id, time, true))
    }

    pub fn stretch(&self, duration: f64) -> &Self {
        self.control("stretch", move |e, id| e.stretch(id, duration))
    }

    pub fn set_speed(&self, speed: f64) -> &Self {
        self.control("set_speed", move |e, id| e.set_timer_speed(id, speed))
    }

    pub fn set_fps(&self, fps: f64) -> &Self {
        self.control("set_fps", move |e, id| e.set_timer_fps(id, fps))
    }

    pub fn set_current_time(&self, time: f64) -> &Self {
        self.control("set_current_time", move |e, id| e.set_current_time(id, time))
    }

    pub fn set_progress(&self, progress: f64) -> &Self {
        self.control("set_progress", move |e, id| e.set_progress(id, progress))
    }

    pub fn set_iteration_progress(&self, progress: f64) -> &Self {
        self.control("set_iteration_progress", move |e, id| {
            e.set_iteration_progress(id, progress)
        })
    }

    pub fn set_current_iteration(&self, iteration: u64) -> &Self {
        self.control("set_current_iteration", move |e, id| {
            e.set_current_iteration(id, iteration)
        })
    }

    /// Current playback state. `Err(EngineBusy)` from inside a callback.
    pub fn view(&self) -> Result<TimerView> {
        self.engine.try_with(|e| e.view(self.id))
    }

    pub fn current_time(&self) -> Result<f64> {
        self.view().map(|v| v.current_time)
    }

    pub fn iteration_current_time(&self) -> Result<f64> {
        self.view().map(|v| v.iteration_current_time)
    }

    pub fn progress(&self) -> Result<f64> {
        self.view().map(|v| v.progress)
    }

    pub fn iteration_progress(&self) -> Result<f64> {
        self.view().map(|v| v.iteration_progress)
    }

    pub fn current_iteration(&self) -> Result<u64> {
        self.view().map(|v| v.current_iteration)
    }

    pub fn duration(&self) -> Result<f64> {
        self.view().map(|v| v.duration)
    }

    pub fn is_paused(&self) -> Result<bool> {
        self.view().map(|v| v.paused)
    }

    pub fn is_completed(&self) -> Result<bool> {
        self.view().map(|v| v.completed)
    }

    pub fn is_cancelled(&self) -> Result<bool> {
        self.view().map(|v| v.cancelled)
    }

    pub fn is_reversed(&self) -> Result<bool> {
        self.view().map(|v| v.reversed)
    }

    /// Future resolved on the next natural completion.
    pub fn then(&self) -> Result<Completion> {
        let mut engine = self
            .engine
            .engine
            .try_borrow_mut()
            .map_err(|_| TweenError::EngineBusy)?;
        engine.then(self.id)
    }

    /// Number of live handles to this timer.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.guard)
    }
}

/// Something whose properties can be read and animated one at a time.
pub trait Animatable {
    fn get(&self, property: &str) -> Option<Value>;
    fn set(&self, property: &str, value: RawValue, duration: f64, ease: Easing) -> Timer;
}

/// `Animatable` over one engine target.
#[derive(Clone, Debug)]
pub struct AnimatableTarget {
    engine: EngineHandle,
    target: TargetId,
}

impl AnimatableTarget {
    pub fn new(engine: &EngineHandle, target: TargetId) -> Self {
        Self {
            engine: engine.clone(),
            target,
        }
    }

    #[inline]
    pub fn target(&self) -> TargetId {
        self.target
    }
}

impl Animatable for AnimatableTarget {
    fn get(&self, property: &str) -> Option<Value> {
        self.engine.read(self.target, property)
    }

    fn set(&self, property: &str, value: RawValue, duration: f64, ease: Easing) -> Timer {
        let params = AnimationParams::new().prop(
            property,
            TweenParams::to(value).duration(duration).ease(ease),
        );
        self.engine.create_animation(&[self.target], params)
    }
}
