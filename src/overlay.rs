/// Overlay manager: floating notes panels anchored to their triggers
///
/// This module owns the full lifecycle of the notes overlays: binding
/// trigger controls to target panels, the show/hide state machine, the
/// single-mounted invariant, cooperative locking against rapid input bursts,
/// and the hydration memo that ensures a release's notes are fetched at most
/// once and written into every panel sharing that release.
///
/// All state lives in explicit registries here instead of being stamped onto
/// UI nodes, so the machine is inspectable and testable without a renderer.
/// Dismissal listeners are not managed here: the application installs its
/// outside-press layer and cancel-key subscription only while
/// `is_mounted()` reports true, which scopes them structurally.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::geometry;
use crate::notes::NoteSpan;
use crate::state::data::extract_numeric_id;

/// How long a panel stays locked after a show/hide transition, and how long
/// a trigger stays busy after handling an activation. Long enough to swallow
/// a duplicate event from the same input burst, short enough to never be
/// noticed by a human.
pub const TRANSITION_LOCK: Duration = Duration::from_millis(50);

/// Vertical gap between a trigger and its mounted panel
const ANCHOR_GAP: f32 = 6.0;

/// Panel width bounds (the preferred width is the anchor card's width)
const PANEL_MIN_WIDTH: f32 = 240.0;
const PANEL_MAX_WIDTH: f32 = 720.0;

/// Safe position used when the anchor rect cannot be resolved
const FALLBACK_POSITION: PanelPosition = PanelPosition {
    left: 8.0,
    top: 8.0,
    width: 420.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(pub usize);

/// Hydration state of a panel's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    Empty,
    Loaded,
}

/// Screen position of a mounted panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelPosition {
    pub left: f32,
    pub top: f32,
    pub width: f32,
}

/// Anchor rect of the trigger a panel mounts under, in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub left: f32,
    pub bottom: f32,
    /// Width of the card the trigger sits in; the panel matches it
    pub width: f32,
}

/// Static description of a panel as declared by the surrounding page
#[derive(Debug, Clone)]
pub struct PanelSpec {
    /// Unique name, also the target of explicit references
    pub name: String,
    /// Numeric release identifier this panel belongs to
    pub release_pk: Option<u32>,
    /// Section tag disambiguating duplicate listings of the same release
    pub section: Option<String>,
    /// Home container the panel rests in while unmounted
    pub home: String,
}

/// Static description of a trigger control
#[derive(Debug, Clone)]
pub struct TriggerSpec {
    /// Unique name; binding the same name twice is a no-op
    pub name: String,
    /// Raw release identifier, e.g. "release-42"
    pub release_id: String,
    /// Accessibility-style reference to the controlled panel
    pub controls_ref: Option<String>,
    /// Explicit data reference to the target panel
    pub explicit_ref: Option<String>,
    pub section: Option<String>,
    /// Container the trigger sits in, used to record a co-located panel
    pub home: String,
}

/// Lifecycle state of one panel
#[derive(Debug)]
pub struct PanelState {
    spec: PanelSpec,
    pub content: Vec<NoteSpan>,
    pub hydration: Hydration,
    /// Cooperative transition lock; released when the deadline passes
    locked_until: Option<Instant>,
    /// `Some` while mounted, `None` while resting in the home container
    pub position: Option<PanelPosition>,
}

impl PanelState {
    pub fn release_pk(&self) -> Option<u32> {
        self.spec.release_pk
    }

    pub fn is_mounted(&self) -> bool {
        self.position.is_some()
    }

    fn locked(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|t| t > now)
    }

    fn lock(&mut self, now: Instant) {
        self.locked_until = Some(now + TRANSITION_LOCK);
    }
}

/// Lifecycle state of one trigger
#[derive(Debug)]
struct TriggerState {
    spec: TriggerSpec,
    /// Reference to a panel co-located in the trigger's container,
    /// recorded once at bind time
    recorded_ref: Option<String>,
    busy_until: Option<Instant>,
    /// Whether this trigger's panel is currently shown (aria-expanded)
    active: bool,
}

impl TriggerState {
    fn busy(&self, now: Instant) -> bool {
        self.busy_until.is_some_and(|t| t > now)
    }
}

/// Result of an activation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Busy trigger, locked panel, or no panel resolved; a defined no-op
    Ignored,
    /// The panel was visible and has been hidden
    Dismissed(PanelId),
    /// The panel is now mounted; `hydrate` carries the release id to fetch
    /// when its notes have never been requested before
    Mounted {
        panel: PanelId,
        hydrate: Option<u32>,
    },
}

/// Registry and state machine for all notes panels on the page
pub struct OverlayManager {
    panels: Vec<PanelState>,
    triggers: Vec<TriggerState>,
    /// The single mounted panel and the trigger that opened it.
    /// This field is the invariant: there is no other way to be mounted.
    mounted: Option<(TriggerId, PanelId)>,
    /// Release ids whose hydration has been issued or applied
    requested: HashSet<u32>,
}

impl OverlayManager {
    pub fn new() -> Self {
        OverlayManager {
            panels: Vec::new(),
            triggers: Vec::new(),
            mounted: None,
            requested: HashSet::new(),
        }
    }

    /// Register panels from the page markup. Names already registered are
    /// skipped, so re-registration after dynamic inserts is safe.
    pub fn register_panels(&mut self, specs: Vec<PanelSpec>) {
        for spec in specs {
            if self.panel_by_name(&spec.name).is_some() {
                continue;
            }
            self.panels.push(PanelState {
                spec,
                content: Vec::new(),
                hydration: Hydration::Empty,
                locked_until: None,
                position: None,
            });
        }
    }

    /// Idempotently wire triggers. A trigger whose name is already bound
    /// keeps its existing state; new triggers record a reference to a panel
    /// co-located in their container, used as a resolution fallback.
    pub fn bind(&mut self, specs: Vec<TriggerSpec>) -> Vec<TriggerId> {
        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            if let Some(existing) = self
                .triggers
                .iter()
                .position(|t| t.spec.name == spec.name)
            {
                ids.push(TriggerId(existing));
                continue;
            }
            let recorded_ref = self
                .panels
                .iter()
                .find(|p| p.spec.home == spec.home)
                .map(|p| p.spec.name.clone());
            self.triggers.push(TriggerState {
                spec,
                recorded_ref,
                busy_until: None,
                active: false,
            });
            ids.push(TriggerId(self.triggers.len() - 1));
        }
        ids
    }

    /// Toggle the panel resolved for `trigger`.
    ///
    /// Shows it anchored below the trigger (clamped to the viewport), hiding
    /// any other mounted panel first; hides it if it is already visible.
    /// A busy trigger or locked panel makes this a no-op.
    pub fn activate(
        &mut self,
        trigger: TriggerId,
        anchor: Option<Anchor>,
        viewport_width: f32,
        now: Instant,
    ) -> Activation {
        let Some(state) = self.triggers.get(trigger.0) else {
            return Activation::Ignored;
        };
        if state.busy(now) {
            return Activation::Ignored;
        }
        // Guard the rest of this activation against the same input burst
        self.triggers[trigger.0].busy_until = Some(now + TRANSITION_LOCK);

        let Some(panel) = self.resolve(trigger) else {
            return Activation::Ignored;
        };

        if self.panels[panel.0].is_mounted() {
            return if self.hide(trigger, panel, now) {
                Activation::Dismissed(panel)
            } else {
                Activation::Ignored
            };
        }

        if self.panels[panel.0].locked(now) {
            return Activation::Ignored;
        }

        // Enforce the single-mounted invariant before anything async can
        // happen: whatever else is up comes down now, lock or no lock.
        if let Some((prev_trigger, prev_panel)) = self.mounted.take() {
            self.unmount(prev_trigger, prev_panel, now);
        }

        let position = match anchor {
            Some(anchor) => {
                let width = anchor.width.clamp(PANEL_MIN_WIDTH, PANEL_MAX_WIDTH);
                PanelPosition {
                    left: geometry::clamp_to_viewport(anchor.left, width, viewport_width, 0.0),
                    top: anchor.bottom + ANCHOR_GAP,
                    width,
                }
            }
            None => FALLBACK_POSITION,
        };

        let state = &mut self.panels[panel.0];
        state.position = Some(position);
        state.lock(now);
        self.triggers[trigger.0].active = true;
        self.mounted = Some((trigger, panel));

        // Hydrate once per release: never when the panel already has
        // content, never when a request for this release is in flight or
        // has landed.
        let hydrate = if self.panels[panel.0].hydration == Hydration::Empty
            && self.panels[panel.0].content.is_empty()
        {
            extract_numeric_id(&self.triggers[trigger.0].spec.release_id)
                .filter(|pk| self.requested.insert(*pk))
        } else {
            None
        };

        Activation::Mounted { panel, hydrate }
    }

    /// Dismiss whatever panel is mounted (outside interaction, cancel key).
    /// Returns false when nothing is mounted or the panel is locked.
    pub fn dismiss_mounted(&mut self, now: Instant) -> bool {
        match self.mounted {
            Some((trigger, panel)) => self.hide(trigger, panel, now),
            None => false,
        }
    }

    /// Hide a mounted panel, respecting its transition lock
    fn hide(&mut self, trigger: TriggerId, panel: PanelId, now: Instant) -> bool {
        if self.panels[panel.0].locked(now) {
            return false;
        }
        // The toggling trigger may differ from the one that opened the
        // panel; deactivate the opener too
        if let Some((opener, mounted_panel)) = self.mounted {
            if mounted_panel == panel {
                if let Some(t) = self.triggers.get_mut(opener.0) {
                    t.active = false;
                }
                self.mounted = None;
            }
        }
        self.unmount(trigger, panel, now);
        true
    }

    /// Return a panel to its home container and mark its trigger inactive
    fn unmount(&mut self, trigger: TriggerId, panel: PanelId, now: Instant) {
        let state = &mut self.panels[panel.0];
        state.position = None;
        state.lock(now);
        if let Some(t) = self.triggers.get_mut(trigger.0) {
            t.active = false;
        }
    }

    /// Write sanitized notes into every panel tagged with this release id,
    /// marking each loaded. Idempotent content replacement: a late result
    /// for a panel that was displaced in the meantime is harmless.
    pub fn apply_notes(&mut self, pk: u32, spans: &[NoteSpan]) -> usize {
        self.requested.insert(pk);
        let mut written = 0;
        for panel in &mut self.panels {
            if panel.spec.release_pk == Some(pk) {
                panel.content = spans.to_vec();
                panel.hydration = Hydration::Loaded;
                written += 1;
            }
        }
        written
    }

    /// Resolve the target panel for a trigger.
    ///
    /// Precedence: the accessibility-style controls reference, then the
    /// explicit data reference or the reference recorded at bind time, then
    /// a search over panels tagged with the trigger's numeric release id
    /// (preferring the trigger's section), and finally the legacy fixed-name
    /// lookups kept for pages that predate panel name tags.
    fn resolve(&self, trigger: TriggerId) -> Option<PanelId> {
        let t = &self.triggers[trigger.0];

        if let Some(name) = &t.spec.controls_ref {
            if let Some(panel) = self.panel_by_name(name) {
                return Some(panel);
            }
        }

        for reference in [&t.spec.explicit_ref, &t.recorded_ref] {
            if let Some(name) = reference {
                if let Some(panel) = self.panel_by_name(name) {
                    return Some(panel);
                }
                // A dangling reference still identifies the trigger's own
                // container; fall back to any panel resting there
                if let Some(panel) = self
                    .panels
                    .iter()
                    .position(|p| p.spec.home == t.spec.home)
                {
                    return Some(PanelId(panel));
                }
            }
        }

        let pk = extract_numeric_id(&t.spec.release_id)?;
        let candidates: Vec<usize> = self
            .panels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.spec.release_pk == Some(pk))
            .map(|(i, _)| i)
            .collect();

        if !candidates.is_empty() {
            if let Some(section) = &t.spec.section {
                let in_section = candidates
                    .iter()
                    .copied()
                    .find(|&i| self.panels[i].spec.section.as_ref() == Some(section));
                if let Some(panel) = in_section {
                    return Some(PanelId(panel));
                }
            }
            return Some(PanelId(candidates[0]));
        }

        // Legacy id formats from the older markup scheme
        for legacy in [format!("manage-notes-{}", pk), format!("notes-{}", pk)] {
            if let Some(panel) = self.panel_by_name(&legacy) {
                return Some(panel);
            }
        }

        None
    }

    fn panel_by_name(&self, name: &str) -> Option<PanelId> {
        self.panels
            .iter()
            .position(|p| p.spec.name == name)
            .map(PanelId)
    }

    /// The mounted panel, if any, for rendering the floating layer
    pub fn mounted(&self) -> Option<(PanelId, &PanelState)> {
        self.mounted
            .map(|(_, panel)| (panel, &self.panels[panel.0]))
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn panel(&self, panel: PanelId) -> &PanelState {
        &self.panels[panel.0]
    }

    /// Count of panels currently mounted; the invariant says this is 0 or 1
    pub fn mounted_count(&self) -> usize {
        self.panels.iter().filter(|p| p.is_mounted()).count()
    }
}

impl Default for OverlayManager {
    fn default() -> Self {
        Self::new()
    }
}
