/// UI widget programs
///
/// Custom canvas programs used by the main view:
/// - The viewer stage (stage.rs): draws the current image with its
///   zoom/pan transform and turns pointer input into viewer messages

pub mod stage;
