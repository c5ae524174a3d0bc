//! Touch gesture interpreter.
//!
//! One finger rotates, two fingers pinch-scale and twist. The interpreter
//! only tracks a working transform for its target; the caller writes the
//! returned [`GestureUpdate`] to the scene engine.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use shared::GestureConfig;
use tracing::debug;

use crate::platform::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Raw touch-pointer event on the viewport
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub phase: PointerPhase,
    /// Viewport position in pixels
    pub position: Vec2,
    /// Markers of the hit element and its ancestors, innermost first
    pub ancestry: Vec<String>,
}

impl PointerEvent {
    pub fn new(pointer_id: u32, phase: PointerPhase, position: Vec2) -> Self {
        Self {
            pointer_id,
            phase,
            position,
            ancestry: Vec::new(),
        }
    }

    pub fn on_element(mut self, markers: &[&str]) -> Self {
        self.ancestry = markers.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// New transform for the attached target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureUpdate {
    pub entity: EntityId,
    /// Euler degrees
    pub rotation: Vec3,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy)]
struct Target {
    entity: EntityId,
    rotation: Vec3,
    scale: f32,
    base_scale: f32,
}

#[derive(Debug, Clone, Copy)]
struct Pointer {
    id: u32,
    position: Vec2,
}

/// Converts touch input into rotate / scale updates for one entity
pub struct GestureInterpreter {
    config: GestureConfig,
    target: Option<Target>,
    pointers: Vec<Pointer>,
    /// Anchor for single-finger rotation
    rotate_anchor: Option<Vec2>,
    last_distance: Option<f32>,
    /// Degrees
    last_angle: Option<f32>,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            target: None,
            pointers: Vec::new(),
            rotate_anchor: None,
            last_distance: None,
            last_angle: None,
        }
    }

    /// Attach to `entity`, replacing any previous target.
    ///
    /// `scale` becomes both the gesture baseline and the clamp reference.
    pub fn attach(&mut self, entity: EntityId, rotation: Vec3, scale: f32) {
        self.detach();
        self.target = Some(Target {
            entity,
            rotation,
            scale,
            base_scale: scale,
        });
        debug!("Gestures attached to {:?} (base scale {scale})", entity);
    }

    /// Stop listening; safe to call when already detached
    pub fn detach(&mut self) {
        if let Some(target) = self.target.take() {
            debug!("Gestures detached from {:?}", target.entity);
        }
        self.pointers.clear();
        self.rotate_anchor = None;
        self.last_distance = None;
        self.last_angle = None;
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target.map(|t| t.entity)
    }

    pub fn base_scale(&self) -> Option<f32> {
        self.target.map(|t| t.base_scale)
    }

    /// Allowed scale range for the current target
    pub fn scale_bounds(&self) -> Option<(f32, f32)> {
        self.target.map(|t| self.bounds_for(t.base_scale))
    }

    /// Ordered so swapped factors in the config cannot invert the range
    fn bounds_for(&self, base_scale: f32) -> (f32, f32) {
        let a = base_scale * self.config.min_scale_factor;
        let b = base_scale * self.config.max_scale_factor;
        (a.min(b), a.max(b))
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    fn is_ui_target(&self, event: &PointerEvent) -> bool {
        event
            .ancestry
            .iter()
            .any(|m| self.config.ui_markers.iter().any(|ui| ui == m))
    }

    /// Feed one pointer event; returns the target's new transform if it changed
    pub fn handle(&mut self, event: &PointerEvent) -> Option<GestureUpdate> {
        self.target.as_ref()?;

        match event.phase {
            PointerPhase::Down => {
                if self.is_ui_target(event) {
                    return None;
                }
                self.pointer_down(event.pointer_id, event.position);
                None
            }
            PointerPhase::Move => self.pointer_move(event.pointer_id, event.position),
            PointerPhase::Up | PointerPhase::Cancel => {
                self.pointer_up(event.pointer_id);
                None
            }
        }
    }

    fn pointer_down(&mut self, id: u32, position: Vec2) {
        if self.pointers.iter().any(|p| p.id == id) || self.pointers.len() >= 2 {
            return;
        }
        self.pointers.push(Pointer { id, position });
        self.reset_anchors();
    }

    fn pointer_up(&mut self, id: u32) {
        let before = self.pointers.len();
        self.pointers.retain(|p| p.id != id);
        if self.pointers.len() != before {
            self.reset_anchors();
        }
    }

    /// Re-anchor after the pointer count changes so stale multi-touch state
    /// is never compared against new single-touch state
    fn reset_anchors(&mut self) {
        match self.pointers.as_slice() {
            [single] => {
                self.rotate_anchor = Some(single.position);
                self.last_distance = None;
                self.last_angle = None;
            }
            [a, b] => {
                self.rotate_anchor = None;
                self.last_distance = Some(a.position.distance(b.position));
                self.last_angle = Some(finger_angle(a.position, b.position));
            }
            _ => {
                self.rotate_anchor = None;
                self.last_distance = None;
                self.last_angle = None;
            }
        }
    }

    fn pointer_move(&mut self, id: u32, position: Vec2) -> Option<GestureUpdate> {
        let pointer = self.pointers.iter_mut().find(|p| p.id == id)?;
        pointer.position = position;

        match self.pointers.len() {
            1 => self.rotate(position),
            2 => self.pinch_and_twist(),
            _ => None,
        }
    }

    fn rotate(&mut self, position: Vec2) -> Option<GestureUpdate> {
        let anchor = self.rotate_anchor.replace(position)?;
        let delta = position - anchor;
        let speed = self.config.rotation_speed;
        let dual_axis = self.config.dual_axis_rotation;
        let target = self.target.as_mut()?;

        target.rotation.y += delta.x * speed;
        if dual_axis {
            target.rotation.x += delta.y * speed;
        }
        Some(update_for(target))
    }

    fn pinch_and_twist(&mut self) -> Option<GestureUpdate> {
        let (a, b) = (self.pointers[0].position, self.pointers[1].position);
        let distance = a.distance(b);
        let angle = finger_angle(a, b);
        let scale_speed = self.config.scale_speed;
        let twist_speed = self.config.twist_speed;

        let prev_distance = self.last_distance.replace(distance);
        let prev_angle = self.last_angle.replace(angle);
        let (min, max) = self.bounds_for(self.target?.base_scale);
        let target = self.target.as_mut()?;

        if let Some(prev) = prev_distance.filter(|d| *d > f32::EPSILON) {
            let ratio = distance / prev;
            let scaled = target.scale * (1.0 + (ratio - 1.0) * scale_speed);
            target.scale = scaled.max(min).min(max);
        }

        if let Some(prev) = prev_angle {
            let delta = normalize_degrees(angle - prev);
            target.rotation.y -= delta * twist_speed;
        }

        Some(update_for(target))
    }
}

fn update_for(target: &Target) -> GestureUpdate {
    GestureUpdate {
        entity: target.entity,
        rotation: target.rotation,
        scale: target.scale,
    }
}

/// Angle of the finger-to-finger vector, in degrees
fn finger_angle(a: Vec2, b: Vec2) -> f32 {
    let d = b - a;
    d.y.atan2(d.x).to_degrees()
}

/// Wrap an angle delta into [-180, 180]
fn normalize_degrees(mut delta: f32) -> f32 {
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta
}
