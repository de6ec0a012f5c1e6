/// Album Shelf: a native browser for record-catalog folders
///
/// The window shows a featured strip and a full listing of release cards.
/// Each card carries a notes trigger (opens the floating notes panel for
/// that release) and an images trigger (opens the modal viewer over the
/// release's image sequence). After a catalog loads, a bounded worker pool
/// hydrates card metadata in the background.

mod fetcher;
mod geometry;
mod notes;
mod overlay;
mod scheme;
mod state;
mod ui;
mod viewer;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cgmath::Vector2;
use iced::futures::{SinkExt, Stream};
use iced::keyboard::{self, key};
use iced::widget::{
    button, canvas, column, container, image, mouse_area, pick_list, row, scrollable, stack, text,
    Space, Stack,
};
use iced::{Alignment, Element, Event, Length, Padding, Size, Subscription, Task, Theme};
use iced_aw::Wrap;

use fetcher::{FolderSource, HydrationOutcome, HydrationTarget, MetadataSource, ReleaseDetails};
use notes::{sanitize_notes, NoteSpan};
use overlay::{
    Activation, Anchor, Hydration, OverlayManager, PanelSpec, PanelState, TriggerId, TriggerSpec,
};
use state::catalog;
use state::data::ReleaseCard;
use ui::stage::ViewerStage;
use viewer::{ImageViewer, ViewerEvent};

/// Fixed width of one release card in the grid
const CARD_WIDTH: f32 = 260.0;

/// Fraction of the window the viewer modal occupies
const STAGE_WIDTH_FRACTION: f32 = 0.9;
const STAGE_HEIGHT_FRACTION: f32 = 0.8;

/// Room the modal chrome (caption, controls, padding) takes off the stage
const STAGE_CHROME_WIDTH: f32 = 48.0;
const STAGE_CHROME_HEIGHT: f32 = 120.0;

fn main() -> iced::Result {
    env_logger::init();

    iced::application("Album Shelf", AlbumShelf::update, AlbumShelf::view)
        .subscription(AlbumShelf::subscription)
        .theme(AlbumShelf::theme)
        .window_size(Size::new(1280.0, 860.0))
        .run_with(AlbumShelf::new)
}

/// Which listing a card (and its notes trigger) belongs to; the first few
/// releases appear in both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Featured,
    All,
}

impl Section {
    fn tag(self) -> &'static str {
        match self {
            Section::Featured => "featured",
            Section::All => "all",
        }
    }
}

/// A probed image: its source path and natural pixel dimensions
#[derive(Debug, Clone)]
struct LoadedImage {
    path: PathBuf,
    width: u32,
    height: u32,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    OpenCatalog,
    CatalogLoaded(Result<Vec<ReleaseCard>, String>),

    ToggleNotes { section: Section, card: usize },
    NotesAnchor { trigger: TriggerId, anchor: Option<Anchor> },
    PanelHydrated { pk: u32, result: Result<ReleaseDetails, String> },
    HydrationArrived(HydrationOutcome),
    DismissOverlay,
    CancelPressed,

    OpenViewer { card: usize },
    ViewerImageLoaded(Result<LoadedImage, String>),
    ViewerNavigate(i32),
    ViewerToggleZoom,
    ViewerClose,
    StageZoom { point: Vector2<f32>, factor: f32 },
    StagePanStart { point: Vector2<f32> },
    StagePanMove { point: Vector2<f32> },
    StagePanEnd,
    StageToggleZoom { point: Vector2<f32> },

    SchemeSelected(String),
    WindowResized(Size),
}

/// Main application state
struct AlbumShelf {
    catalog: Vec<ReleaseCard>,
    overlays: OverlayManager,
    viewer: ImageViewer,
    /// Metadata source for the loaded catalog; rebuilt on every load
    source: Option<Arc<dyn MetadataSource>>,
    /// Notes trigger registered for each card occurrence
    note_triggers: HashMap<(Section, usize), TriggerId>,
    /// Card whose images trigger regains focus after the viewer closes
    focused_trigger: Option<usize>,
    schemes: Vec<String>,
    scheme: String,
    window: Size,
    /// Status message to display to the user
    status: String,
}

impl AlbumShelf {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let schemes = scheme::default_schemes();
        let current = scheme::load_scheme(&schemes);
        log::info!("starting with color scheme {}", current);

        (
            AlbumShelf {
                catalog: Vec::new(),
                overlays: OverlayManager::new(),
                viewer: ImageViewer::new(),
                source: None,
                note_triggers: HashMap::new(),
                focused_trigger: None,
                schemes,
                scheme: current,
                window: Size::new(1280.0, 860.0),
                status: "Open a catalog folder to begin.".to_string(),
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenCatalog => {
                // Show the native folder picker dialog
                let folder = rfd::FileDialog::new()
                    .set_title("Select Catalog Folder")
                    .pick_folder();

                if let Some(folder) = folder {
                    self.status = format!("Scanning {}...", folder.display());
                    return Task::perform(catalog::load_catalog(folder), Message::CatalogLoaded);
                }

                Task::none()
            }

            Message::CatalogLoaded(Ok(cards)) => self.install_catalog(cards),

            Message::CatalogLoaded(Err(err)) => {
                log::error!("catalog scan failed: {}", err);
                self.status = format!("Could not load catalog: {}", err);
                Task::none()
            }

            Message::ToggleNotes { section, card } => {
                let Some(&trigger) = self.note_triggers.get(&(section, card)) else {
                    return Task::none();
                };
                // Resolve the trigger's on-screen rect first; the panel
                // mounts anchored below it
                container::visible_bounds(anchor_id(section, card)).map(move |rect| {
                    Message::NotesAnchor {
                        trigger,
                        anchor: rect.map(|r| Anchor {
                            left: r.x,
                            bottom: r.y + r.height,
                            width: CARD_WIDTH,
                        }),
                    }
                })
            }

            Message::NotesAnchor { trigger, anchor } => {
                let outcome =
                    self.overlays
                        .activate(trigger, anchor, self.window.width, Instant::now());
                if let Activation::Mounted {
                    hydrate: Some(pk), ..
                } = outcome
                {
                    if let Some(source) = self.source.clone() {
                        return Task::perform(
                            async move { source.fetch(pk).await.map_err(|e| e.to_string()) },
                            move |result| Message::PanelHydrated { pk, result },
                        );
                    }
                }
                Task::none()
            }

            Message::PanelHydrated { pk, result } => {
                match result {
                    Ok(details) => {
                        let spans = sanitize_notes(details.notes.as_deref().unwrap_or(""));
                        self.overlays.apply_notes(pk, &spans);
                    }
                    Err(err) => {
                        // The panel keeps showing its placeholder
                        log::debug!("notes hydration for release {} failed: {}", pk, err);
                    }
                }
                Task::none()
            }

            Message::HydrationArrived(outcome) => {
                if let Some(lines) = &outcome.details.formats_lines {
                    if !lines.is_empty() {
                        if let Some(card) = self.catalog.get_mut(outcome.index) {
                            card.formats = lines.clone();
                        }
                    }
                }
                if let Some(notes) = &outcome.details.notes {
                    self.overlays.apply_notes(outcome.pk, &sanitize_notes(notes));
                }
                Task::none()
            }

            Message::DismissOverlay => {
                self.overlays.dismiss_mounted(Instant::now());
                Task::none()
            }

            Message::CancelPressed => {
                if self.viewer.is_open() {
                    self.close_viewer();
                } else {
                    self.overlays.dismiss_mounted(Instant::now());
                }
                Task::none()
            }

            Message::OpenViewer { card } => {
                let Some(release) = self.catalog.get(card) else {
                    return Task::none();
                };
                self.focused_trigger = None;
                match self.viewer.open(release.images.clone(), 0, card) {
                    ViewerEvent::Load(path) => {
                        Task::perform(probe_image(path), Message::ViewerImageLoaded)
                    }
                    _ => Task::none(),
                }
            }

            Message::ViewerImageLoaded(Ok(loaded)) => {
                // A stale result (the viewer moved on or closed) applies to
                // nothing
                if self.viewer.current_source() != Some(&loaded.path) {
                    return Task::none();
                }
                let natural = Vector2::new(loaded.width as f32, loaded.height as f32);
                let prefetch = self.viewer.image_loaded(natural, self.stage_size());
                Task::batch(
                    prefetch
                        .into_iter()
                        .map(|path| Task::future(probe_image(path)).discard()),
                )
            }

            Message::ViewerImageLoaded(Err(err)) => {
                log::debug!("image probe failed: {}", err);
                Task::none()
            }

            Message::ViewerNavigate(step) => {
                if let ViewerEvent::Load(path) = self.viewer.navigate(step) {
                    return Task::perform(probe_image(path), Message::ViewerImageLoaded);
                }
                Task::none()
            }

            Message::ViewerToggleZoom => {
                let stage = self.stage_size();
                self.viewer
                    .toggle_zoom(Vector2::new(stage.x / 2.0, stage.y / 2.0), stage);
                Task::none()
            }

            Message::ViewerClose => {
                self.close_viewer();
                Task::none()
            }

            Message::StageZoom { point, factor } => {
                let stage = self.stage_size();
                self.viewer.zoom_at(point, factor, stage);
                Task::none()
            }

            Message::StagePanStart { point } => {
                self.viewer.pan_start(point, self.stage_size());
                Task::none()
            }

            Message::StagePanMove { point } => {
                if self.viewer.is_dragging() {
                    self.viewer.pan_move(point, self.stage_size());
                }
                Task::none()
            }

            Message::StagePanEnd => {
                self.viewer.pan_end();
                Task::none()
            }

            Message::StageToggleZoom { point } => {
                self.viewer.toggle_zoom(point, self.stage_size());
                Task::none()
            }

            Message::SchemeSelected(name) => {
                let normalized = scheme::normalize_scheme_name(&name);
                if self.schemes.contains(&normalized) {
                    self.scheme = normalized;
                    scheme::save_scheme(&self.scheme);
                }
                Task::none()
            }

            Message::WindowResized(size) => {
                self.window = size;
                Task::none()
            }
        }
    }

    /// Install a freshly scanned catalog: rebuild the overlay registries,
    /// rebind the notes triggers, and launch background hydration.
    fn install_catalog(&mut self, cards: Vec<ReleaseCard>) -> Task<Message> {
        self.catalog = cards;
        self.focused_trigger = None;
        self.overlays = OverlayManager::new();
        self.note_triggers.clear();

        let mut documents = HashMap::new();
        for card in &self.catalog {
            if let (Some(pk), Some(details)) = (card.pk, card.details.clone()) {
                documents.insert(pk, details);
            }
        }
        let source: Arc<dyn MetadataSource> = Arc::new(FolderSource::new(documents));
        self.source = Some(Arc::clone(&source));

        let mut panels = Vec::new();
        let mut triggers = Vec::new();
        let mut keys = Vec::new();
        for (index, card) in self.catalog.iter().enumerate() {
            if card.featured {
                let home = format!("featured-{}", index);
                if let Some(pk) = card.pk {
                    panels.push(PanelSpec {
                        name: format!("featured-notes-{}", pk),
                        release_pk: Some(pk),
                        section: Some(Section::Featured.tag().to_string()),
                        home: home.clone(),
                    });
                }
                triggers.push(TriggerSpec {
                    name: format!("t-featured-{}", index),
                    release_id: card.release_id.clone(),
                    // Featured cards wire their panel explicitly; listing
                    // cards rely on release-id resolution
                    controls_ref: card.pk.map(|pk| format!("featured-notes-{}", pk)),
                    explicit_ref: None,
                    section: Some(Section::Featured.tag().to_string()),
                    home,
                });
                keys.push((Section::Featured, index));
            }

            let home = format!("all-{}", index);
            if let Some(pk) = card.pk {
                panels.push(PanelSpec {
                    name: format!("notes-{}", pk),
                    release_pk: Some(pk),
                    section: Some(Section::All.tag().to_string()),
                    home: home.clone(),
                });
            }
            triggers.push(TriggerSpec {
                name: format!("t-all-{}", index),
                release_id: card.release_id.clone(),
                controls_ref: None,
                explicit_ref: None,
                section: Some(Section::All.tag().to_string()),
                home,
            });
            keys.push((Section::All, index));
        }
        self.overlays.register_panels(panels);
        let ids = self.overlays.bind(triggers);
        for (key, id) in keys.into_iter().zip(ids) {
            self.note_triggers.insert(key, id);
        }

        self.status = format!("{} releases loaded.", self.catalog.len());

        let targets: Vec<HydrationTarget> = self
            .catalog
            .iter()
            .enumerate()
            .map(|(index, card)| HydrationTarget {
                index,
                release_id: card.release_id.clone(),
            })
            .collect();
        Task::run(hydration_stream(targets, source), Message::HydrationArrived)
    }

    fn close_viewer(&mut self) {
        if let ViewerEvent::Closed { trigger_card } = self.viewer.close() {
            self.focused_trigger = Some(trigger_card);
        }
    }

    /// Stage area available to the viewer image, derived from the window
    fn stage_size(&self) -> Vector2<f32> {
        Vector2::new(
            (self.window.width * STAGE_WIDTH_FRACTION - STAGE_CHROME_WIDTH).max(200.0),
            (self.window.height * STAGE_HEIGHT_FRACTION - STAGE_CHROME_HEIGHT).max(200.0),
        )
    }

    /// Build the user interface: the page, then the floating layers that
    /// exist only while their state machine says so
    fn view(&self) -> Element<'_, Message> {
        let mut layers: Vec<Element<Message>> = vec![self.page()];
        if let Some((_, panel)) = self.overlays.mounted() {
            layers.push(self.overlay_layer(panel));
        }
        if self.viewer.is_open() {
            layers.push(self.viewer_layer());
        }
        Stack::with_children(layers)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn page(&self) -> Element<'_, Message> {
        let header = row![
            text("Album Shelf").size(26),
            Space::new(Length::Fill, Length::Shrink),
            pick_list(
                self.schemes.clone(),
                Some(self.scheme.clone()),
                Message::SchemeSelected
            ),
            button(text("Open catalog...").size(14)).on_press(Message::OpenCatalog),
        ]
        .spacing(12)
        .align_y(Alignment::Center)
        .padding(12);

        let body: Element<Message> = if self.catalog.is_empty() {
            container(text("No catalog loaded.").size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .align_x(Alignment::Center)
                .align_y(Alignment::Center)
                .into()
        } else {
            let featured: Vec<usize> = self
                .catalog
                .iter()
                .enumerate()
                .filter(|(_, c)| c.featured)
                .map(|(i, _)| i)
                .collect();
            let all: Vec<usize> = (0..self.catalog.len()).collect();

            let mut content = column![].spacing(18).padding(16);
            if !featured.is_empty() {
                content = content.push(text("Featured").size(20));
                content = content.push(self.card_grid(&featured, Section::Featured));
            }
            content = content.push(text("All releases").size(20));
            content = content.push(self.card_grid(&all, Section::All));

            scrollable(content)
                .width(Length::Fill)
                .height(Length::Fill)
                .into()
        };

        let status = container(text(&self.status).size(13)).padding(8);

        column![header, body, status].into()
    }

    fn card_grid(&self, indices: &[usize], section: Section) -> Element<'_, Message> {
        let cards: Vec<Element<Message>> = indices
            .iter()
            .map(|&index| self.card_view(index, section))
            .collect();
        Wrap::with_elements(cards)
            .spacing(14.0)
            .line_spacing(14.0)
            .into()
    }

    fn card_view(&self, index: usize, section: Section) -> Element<'_, Message> {
        let card = &self.catalog[index];

        let thumb: Element<Message> = match card.thumbnail() {
            Some(path) => image(image::Handle::from_path(path))
                .width(Length::Fill)
                .into(),
            None => container(text("no images").size(13))
                .width(Length::Fill)
                .height(Length::Fixed(120.0))
                .align_x(Alignment::Center)
                .align_y(Alignment::Center)
                .into(),
        };

        let formats: Element<Message> = if card.formats.is_empty() {
            text("formats pending").size(12).into()
        } else {
            let lines = card
                .formats
                .iter()
                .map(|line| text(line).size(12).into())
                .collect::<Vec<Element<Message>>>();
            iced::widget::Column::with_children(lines).spacing(2).into()
        };

        let notes_button = container(
            button(text("Notes").size(13))
                .style(button::secondary)
                .on_press(Message::ToggleNotes {
                    section,
                    card: index,
                }),
        )
        .id(anchor_id(section, index));

        // The images trigger regains focus styling after its viewer closes
        let images_style = if self.focused_trigger == Some(index) {
            button::primary
        } else {
            button::secondary
        };
        let mut images_button = button(text("Images").size(13)).style(images_style);
        if !card.images.is_empty() {
            images_button = images_button.on_press(Message::OpenViewer { card: index });
        }

        let content = column![
            thumb,
            text(&card.title).size(15),
            formats,
            row![notes_button, images_button].spacing(8),
        ]
        .spacing(8);

        container(content)
            .padding(10)
            .width(Length::Fixed(CARD_WIDTH))
            .style(container::rounded_box)
            .into()
    }

    /// The floating notes panel plus the outside-press layer beneath it.
    /// Both exist only while a panel is mounted.
    fn overlay_layer<'a>(&'a self, panel: &'a PanelState) -> Element<'a, Message> {
        let Some(position) = panel.position else {
            return Space::new(Length::Shrink, Length::Shrink).into();
        };

        let body: Element<Message> = match panel.hydration {
            Hydration::Loaded if panel.content.is_empty() => {
                text("No notes for this release.").size(13).into()
            }
            Hydration::Loaded => note_flow(&panel.content),
            Hydration::Empty => text("Loading notes...").size(13).into(),
        };

        let sheet = container(column![text("Notes").size(14), body].spacing(8))
            .padding(12)
            .width(Length::Fixed(position.width))
            .style(container::bordered_box);

        let placed = container(sheet)
            .padding(Padding {
                top: position.top,
                right: 0.0,
                bottom: 0.0,
                left: position.left,
            })
            .width(Length::Fill)
            .height(Length::Fill);

        stack![
            mouse_area(Space::new(Length::Fill, Length::Fill)).on_press(Message::DismissOverlay),
            placed,
        ]
        .into()
    }

    /// The modal viewer: a capturing backdrop with the stage sheet centered
    /// over it
    fn viewer_layer(&self) -> Element<'_, Message> {
        let stage = self.stage_size();

        let stage_view: Element<Message> =
            match (self.viewer.current_source(), self.viewer.transform()) {
                (Some(source), Some((natural, zoom, offset))) => canvas(ViewerStage::new(
                    image::Handle::from_path(source),
                    natural,
                    zoom,
                    offset,
                ))
                .width(Length::Fixed(stage.x))
                .height(Length::Fixed(stage.y))
                .into(),
                _ => container(text("Loading image...").size(14))
                    .width(Length::Fixed(stage.x))
                    .height(Length::Fixed(stage.y))
                    .align_x(Alignment::Center)
                    .align_y(Alignment::Center)
                    .into(),
            };

        let header = row![
            text(self.viewer.caption()).size(14),
            Space::new(Length::Fill, Length::Shrink),
            button(text("Close").size(13))
                .style(button::secondary)
                .on_press(Message::ViewerClose),
        ]
        .align_y(Alignment::Center);

        let controls = row![
            button(text("Previous").size(13))
                .style(button::secondary)
                .on_press(Message::ViewerNavigate(-1)),
            button(text("Zoom").size(13))
                .style(button::secondary)
                .on_press(Message::ViewerToggleZoom),
            button(text("Next").size(13))
                .style(button::secondary)
                .on_press(Message::ViewerNavigate(1)),
        ]
        .spacing(10);

        let sheet = container(
            column![header, stage_view, controls]
                .spacing(10)
                .align_x(Alignment::Center),
        )
        .padding(12)
        .style(container::rounded_box);

        let centered = container(sheet)
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(Alignment::Center)
            .align_y(Alignment::Center);

        stack![
            mouse_area(Space::new(Length::Fill, Length::Fill)).on_press(Message::ViewerClose),
            centered,
        ]
        .into()
    }

    /// Input listeners are scoped to the layer that needs them: cancel and
    /// arrow keys exist only while the viewer is open, the cancel key alone
    /// while a notes panel is mounted.
    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![iced::event::listen_with(|event, _status, _window| {
            match event {
                Event::Window(iced::window::Event::Resized(size)) => {
                    Some(Message::WindowResized(size))
                }
                _ => None,
            }
        })];

        if self.viewer.is_open() {
            subscriptions.push(keyboard::on_key_press(|key, _modifiers| match key {
                keyboard::Key::Named(key::Named::Escape) => Some(Message::CancelPressed),
                keyboard::Key::Named(key::Named::ArrowLeft) => Some(Message::ViewerNavigate(-1)),
                keyboard::Key::Named(key::Named::ArrowRight) => Some(Message::ViewerNavigate(1)),
                _ => None,
            }));
        } else if self.overlays.is_mounted() {
            subscriptions.push(keyboard::on_key_press(|key, _modifiers| match key {
                keyboard::Key::Named(key::Named::Escape) => Some(Message::CancelPressed),
                _ => None,
            }));
        }

        Subscription::batch(subscriptions)
    }

    /// Set the application theme from the chosen scheme
    fn theme(&self) -> Theme {
        scheme::theme_for(&self.scheme)
    }
}

/// Container id of a card's notes trigger, resolved to an anchor rect when
/// the trigger fires
fn anchor_id(section: Section, card: usize) -> container::Id {
    container::Id::new(format!("notes-anchor-{}-{}", section.tag(), card))
}

/// Render sanitized note spans as a wrapping flow of styled text
fn note_flow(spans: &[NoteSpan]) -> Element<'_, Message> {
    let mut flow: Vec<Element<Message>> = Vec::new();
    for span in spans {
        if span.highlighted {
            flow.push(
                container(text(&span.text).size(13))
                    .padding(2)
                    .style(highlight_style)
                    .into(),
            );
        } else {
            // Word granularity so long notes wrap inside the panel
            for word in span.text.split_whitespace() {
                flow.push(text(word).size(13).into());
            }
        }
    }
    Wrap::with_elements(flow).spacing(4.0).line_spacing(4.0).into()
}

/// Removal markers render on the theme's danger tint
fn highlight_style(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();
    container::Style {
        background: Some(palette.danger.weak.color.into()),
        text_color: Some(palette.danger.weak.text),
        border: iced::border::rounded(3.0),
        ..container::Style::default()
    }
}

/// Read an image's natural dimensions without decoding the pixels.
/// Runs on a blocking thread; header parsing still touches the disk.
async fn probe_image(path: PathBuf) -> Result<LoadedImage, String> {
    tokio::task::spawn_blocking(move || {
        let (width, height) = ::image::image_dimensions(&path)
            .map_err(|e| format!("Failed to read image {}: {}", path.display(), e))?;
        Ok(LoadedImage {
            path,
            width,
            height,
        })
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

/// Bridge the hydration worker pool into the update loop: outcomes flow out
/// of the pool's channel as a stream of messages
fn hydration_stream(
    targets: Vec<HydrationTarget>,
    source: Arc<dyn MetadataSource>,
) -> impl Stream<Item = HydrationOutcome> {
    iced::stream::channel(32, move |mut output| async move {
        let mut outcomes = fetcher::spawn_pool(targets, fetcher::HYDRATION_CONCURRENCY, source);
        while let Some(outcome) = outcomes.recv().await {
            if output.send(outcome).await.is_err() {
                break;
            }
        }
    })
}
