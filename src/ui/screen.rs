use breathwork::clock::Clock;
use ratatui::Frame;

use crate::{
    ui::{render_complete, render_selection, render_session},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen<C: Clock> {
    fn render(&self, app: &App<C>, f: &mut Frame);
}

/// Round selection before a session starts
pub struct SelectionScreen;

impl<C: Clock> Screen<C> for SelectionScreen {
    fn render(&self, app: &App<C>, f: &mut Frame) {
        let area = f.area();
        render_selection(app, area, f.buffer_mut());
    }
}

/// Live breathing / hold / recovery view
pub struct SessionScreen;

impl<C: Clock> Screen<C> for SessionScreen {
    fn render(&self, app: &App<C>, f: &mut Frame) {
        let area = f.area();
        render_session(app, area, f.buffer_mut());
    }
}

/// Summary after completion or stop
pub struct CompleteScreen;

impl<C: Clock> Screen<C> for CompleteScreen {
    fn render(&self, app: &App<C>, f: &mut Frame) {
        let area = f.area();
        render_complete(app, area, f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen<C: Clock + 'static>(state: &AppState) -> Box<dyn Screen<C>> {
    match state {
        AppState::Selecting => Box::new(SelectionScreen),
        AppState::Session => Box::new(SessionScreen),
        AppState::Complete => Box::new(CompleteScreen),
    }
}
