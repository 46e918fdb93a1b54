use crossterm::event::{KeyCode, KeyEvent};

use super::app::App;
use crate::ui::TreeKeyAction;

/// Result of handling a key press.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Refresh,
    Continue,
}

/// Handle a key press. Returns an action indicating what the event loop should do.
pub fn handle_key(app: &mut App, key: KeyEvent) -> KeyAction {
    match app.tree.handle_key(key) {
        TreeKeyAction::Quit => KeyAction::Quit,
        TreeKeyAction::Refresh => KeyAction::Refresh,
        TreeKeyAction::Continue => KeyAction::Continue,
        TreeKeyAction::Unhandled => match key.code {
            KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('d') | KeyCode::Tab => {
                app.toggle_details();
                KeyAction::Continue
            }
            _ => KeyAction::Continue,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TreeModel;
    use crate::source::JsonSource;

    fn app() -> App {
        let source = JsonSource::parse(r#"[{"id": "a"}]"#).unwrap();
        App::new(TreeModel::load(Box::new(source)).unwrap(), "test".into())
    }

    #[test]
    fn esc_quits_without_filter() {
        let mut app = app();
        assert_eq!(handle_key(&mut app, KeyEvent::from(KeyCode::Esc)), KeyAction::Quit);
    }

    #[test]
    fn esc_clears_filter_first() {
        let mut app = app();
        app.tree.model.set_filter(Some("a"));
        assert_eq!(
            handle_key(&mut app, KeyEvent::from(KeyCode::Esc)),
            KeyAction::Continue
        );
        assert!(app.tree.model.filter().is_none());
    }

    #[test]
    fn d_toggles_details() {
        let mut app = app();
        handle_key(&mut app, KeyEvent::from(KeyCode::Char('d')));
        assert!(app.show_details);
        handle_key(&mut app, KeyEvent::from(KeyCode::Tab));
        assert!(!app.show_details);
    }
}
