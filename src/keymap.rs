use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::{CommandDispatcher, NavDirection, TreeCommand, TreeEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeymapProfile {
    /// Arrows and `hjkl`.
    #[default]
    Default,
    Vim,
    Arrows,
}

/// Maps crossterm key events to [`TreeCommand`]s.
#[derive(Clone, Copy, Debug)]
pub struct TreeKeyBindings {
    profile: KeymapProfile,
}

impl Default for TreeKeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeKeyBindings {
    pub const fn new() -> Self {
        Self {
            profile: KeymapProfile::Default,
        }
    }

    pub const fn with_profile(profile: KeymapProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> KeymapProfile {
        self.profile
    }

    pub const fn set_profile(&mut self, profile: KeymapProfile) {
        self.profile = profile;
    }

    /// Resolves a key while no inline edit is active.
    pub fn resolve<C>(&self, key: KeyEvent) -> Option<TreeCommand<C>> {
        let direction = match self.profile {
            KeymapProfile::Default => Self::default_direction(key.code),
            KeymapProfile::Vim => Self::vim_direction(key.code),
            KeymapProfile::Arrows => Self::arrow_direction(key.code),
        };
        if let Some(direction) = direction {
            let shift = key.modifiers.contains(KeyModifiers::SHIFT);
            return Some(match direction {
                NavDirection::Up | NavDirection::Down if shift => TreeCommand::NavigateSelecting {
                    direction,
                    extend: true,
                },
                _ => TreeCommand::Navigate(direction),
            });
        }

        Self::resolve_common(key)
    }

    /// Resolves a key through `custom` first, then the built-in bindings.
    pub fn resolve_with<C, F>(&self, key: KeyEvent, custom: F) -> Option<TreeCommand<C>>
    where
        F: Fn(KeyEvent) -> Option<C>,
    {
        if let Some(command) = custom(key) {
            return Some(TreeCommand::Custom(command));
        }

        self.resolve(key)
    }

    /// Resolves a key while an inline edit is active: only commit and cancel are bound.
    pub const fn resolve_editing<C>(&self, key: KeyEvent) -> Option<TreeCommand<C>> {
        match key.code {
            KeyCode::Enter => Some(TreeCommand::FinishEdit),
            KeyCode::Esc => Some(TreeCommand::CancelEdit),
            _ => None,
        }
    }

    /// Resolves and dispatches a key in one step.
    pub fn handle_key<C, D>(&self, target: &mut D, key: KeyEvent) -> TreeEvent<C>
    where
        D: CommandDispatcher<C>,
    {
        self.resolve(key)
            .map_or(TreeEvent::Unhandled, |command| target.dispatch(command))
    }

    const fn default_direction(code: KeyCode) -> Option<NavDirection> {
        match code {
            KeyCode::Up | KeyCode::Char('k') => Some(NavDirection::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(NavDirection::Down),
            KeyCode::Left | KeyCode::Char('h') => Some(NavDirection::Left),
            KeyCode::Right | KeyCode::Char('l') => Some(NavDirection::Right),
            KeyCode::Home => Some(NavDirection::Home),
            KeyCode::End => Some(NavDirection::End),
            _ => None,
        }
    }

    const fn vim_direction(code: KeyCode) -> Option<NavDirection> {
        match code {
            KeyCode::Char('k') => Some(NavDirection::Up),
            KeyCode::Char('j') => Some(NavDirection::Down),
            KeyCode::Char('h') => Some(NavDirection::Left),
            KeyCode::Char('l') => Some(NavDirection::Right),
            KeyCode::Char('g') => Some(NavDirection::Home),
            KeyCode::Char('G') => Some(NavDirection::End),
            _ => None,
        }
    }

    const fn arrow_direction(code: KeyCode) -> Option<NavDirection> {
        match code {
            KeyCode::Up => Some(NavDirection::Up),
            KeyCode::Down => Some(NavDirection::Down),
            KeyCode::Left => Some(NavDirection::Left),
            KeyCode::Right => Some(NavDirection::Right),
            KeyCode::Home => Some(NavDirection::Home),
            KeyCode::End => Some(NavDirection::End),
            _ => None,
        }
    }

    const fn resolve_common<C>(key: KeyEvent) -> Option<TreeCommand<C>> {
        match key.code {
            KeyCode::Enter => Some(TreeCommand::Activate),
            KeyCode::Char(' ') => Some(TreeCommand::ToggleSelection),
            KeyCode::Tab => Some(TreeCommand::ToggleExpand),
            KeyCode::Char('r') => Some(TreeCommand::ToggleRecursive),
            KeyCode::Char('*') => Some(TreeCommand::ExpandAll),
            KeyCode::Char('-') => Some(TreeCommand::CollapseAll),
            KeyCode::Char('a') => Some(TreeCommand::SelectAll),
            KeyCode::F(2) | KeyCode::Char('e') => Some(TreeCommand::StartEdit),
            KeyCode::Esc => Some(TreeCommand::ClearSelection),
            KeyCode::Char('/') => Some(TreeCommand::ClearSearch),
            _ => None,
        }
    }
}
