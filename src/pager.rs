//! Page/grid state machine
//!
//! A [`Pager`] is the per-device cursor over the app grid. Resolving a press
//! is a pure function of the cursor, the grid snapshot and the key index: it
//! may move the cursor and returns the [`Effect`] the dispatcher must carry
//! out. Nothing here touches the device.

use crate::config::{Action, AppGrid, Direction, Slot};
use crate::error::DeckError;

/// Side effect of a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do
    None,
    /// Blank and release the device, ending its session
    Shutdown,
    /// Re-read the app grid, then redraw the current page
    ReloadAndRerenderAll,
    /// Redraw every key of the (new) current page
    RerenderAll,
    /// Ask the window manager to move focus
    ExternalNavigate(Direction),
    /// Spawn a command, fire-and-forget
    Launch { name: String, argv: Vec<String> },
}

/// Per-device page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    current_page: usize,
    wrap: bool,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Pager {
    /// Cursor on page 0
    pub fn new(wrap: bool) -> Self {
        Self {
            current_page: 0,
            wrap,
        }
    }

    /// Current page index
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Whether left/right wrap around at the ends
    pub fn wrap(&self) -> bool {
        self.wrap
    }

    /// Pull the cursor back onto the last page if the grid shrank
    pub fn clamp(&mut self, page_count: usize) {
        let last = page_count.saturating_sub(1);
        if self.current_page > last {
            self.current_page = last;
        }
    }

    /// Slot under `key` on the current page
    pub fn slot<'a>(&self, grid: &'a AppGrid, key: u8) -> &'a Slot {
        grid.slot(self.current_page, key)
    }

    /// Resolve a key-down on the current page
    ///
    /// Only `MissingCommand` is returned as an error, and it leaves the
    /// cursor untouched.
    pub fn on_press(&mut self, grid: &AppGrid, key: u8) -> Result<Effect, DeckError> {
        self.clamp(grid.page_count());

        let (name, action) = match self.slot(grid, key) {
            Slot::Empty => return Ok(Effect::None),
            Slot::Action { name, action, .. } => (name, action),
        };

        let effect = match action {
            Action::Exit => Effect::Shutdown,
            Action::Reload => Effect::ReloadAndRerenderAll,
            Action::Focus(direction) => Effect::ExternalNavigate(*direction),
            Action::PagePrev => self.prev(grid.page_count()),
            Action::PageNext => self.next(grid.page_count()),
            Action::Launch { command: Some(argv) } => Effect::Launch {
                name: name.clone(),
                argv: argv.clone(),
            },
            Action::Launch { command: None } => {
                return Err(DeckError::MissingCommand {
                    name: name.clone(),
                    page: self.current_page,
                    key,
                })
            }
        };
        Ok(effect)
    }

    fn prev(&mut self, page_count: usize) -> Effect {
        // A single page never changes, wrap or not
        if page_count <= 1 {
            return Effect::None;
        }
        if self.current_page > 0 {
            self.current_page -= 1;
            Effect::RerenderAll
        } else if self.wrap {
            self.current_page = page_count - 1;
            Effect::RerenderAll
        } else {
            Effect::None
        }
    }

    fn next(&mut self, page_count: usize) -> Effect {
        if page_count <= 1 {
            return Effect::None;
        }
        if self.current_page < page_count - 1 {
            self.current_page += 1;
            Effect::RerenderAll
        } else if self.wrap {
            self.current_page = 0;
            Effect::RerenderAll
        } else {
            Effect::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn grid(text: &str) -> AppGrid {
        AppGrid::parse(text, Path::new("apps.json")).unwrap()
    }

    /// `pages` identical pages of [left, right, exit]
    fn nav_grid(pages: usize) -> AppGrid {
        let page = r#"[{"name":"left"},{"name":"right"},{"name":"exit"}]"#;
        grid(&format!("[{}]", vec![page; pages].join(",")))
    }

    const LEFT: u8 = 0;
    const RIGHT: u8 = 1;
    const EXIT: u8 = 2;

    #[test]
    fn test_right_cycles_back_to_start() {
        for pages in 1..=6 {
            let grid = nav_grid(pages);
            for start in 0..pages {
                let mut pager = Pager::new(true);
                pager.current_page = start;
                for _ in 0..pages {
                    pager.on_press(&grid, RIGHT).unwrap();
                }
                assert_eq!(pager.current_page(), start, "pages={pages} start={start}");
            }
        }
    }

    #[test]
    fn test_left_cycles_back_to_start() {
        let grid = nav_grid(4);
        let mut pager = Pager::new(true);
        for _ in 0..4 {
            pager.on_press(&grid, LEFT).unwrap();
        }
        assert_eq!(pager.current_page(), 0);
    }

    #[test]
    fn test_single_page_is_noop() {
        let grid = nav_grid(1);
        for wrap in [true, false] {
            let mut pager = Pager::new(wrap);
            assert_eq!(pager.on_press(&grid, LEFT).unwrap(), Effect::None);
            assert_eq!(pager.on_press(&grid, RIGHT).unwrap(), Effect::None);
            assert_eq!(pager.current_page(), 0);
        }
    }

    #[test]
    fn test_two_page_scenario() {
        let grid = nav_grid(2);
        let mut pager = Pager::new(true);

        assert_eq!(pager.on_press(&grid, RIGHT).unwrap(), Effect::RerenderAll);
        assert_eq!(pager.current_page(), 1);

        assert_eq!(pager.on_press(&grid, RIGHT).unwrap(), Effect::RerenderAll);
        assert_eq!(pager.current_page(), 0);

        assert_eq!(pager.on_press(&grid, LEFT).unwrap(), Effect::RerenderAll);
        assert_eq!(pager.current_page(), 1);

        assert_eq!(pager.on_press(&grid, EXIT).unwrap(), Effect::Shutdown);
    }

    #[test]
    fn test_no_wrap_stops_at_ends() {
        let grid = nav_grid(3);
        let mut pager = Pager::new(false);

        assert_eq!(pager.on_press(&grid, LEFT).unwrap(), Effect::None);
        assert_eq!(pager.current_page(), 0);

        pager.on_press(&grid, RIGHT).unwrap();
        pager.on_press(&grid, RIGHT).unwrap();
        assert_eq!(pager.current_page(), 2);
        assert_eq!(pager.on_press(&grid, RIGHT).unwrap(), Effect::None);
        assert_eq!(pager.current_page(), 2);
    }

    #[test]
    fn test_empty_slot_is_noop() {
        let grid = grid(r#"[[{}, {"name":"right"}], [{}]]"#);
        let mut pager = Pager::new(true);
        assert_eq!(pager.on_press(&grid, 0).unwrap(), Effect::None);
        // Undefined key index
        assert_eq!(pager.on_press(&grid, 9).unwrap(), Effect::None);
        assert_eq!(pager.current_page(), 0);
    }

    #[test]
    fn test_resolves_from_current_page_only() {
        // Key 1 is "right" on page 0 but empty on page 1
        let grid = grid(r#"[[{}, {"name":"right"}], [{"name":"left"}]]"#);
        let mut pager = Pager::new(true);
        assert_eq!(pager.on_press(&grid, 1).unwrap(), Effect::RerenderAll);
        assert_eq!(pager.on_press(&grid, 1).unwrap(), Effect::None);
        assert_eq!(pager.current_page(), 1);
    }

    #[test]
    fn test_launch_and_focus() {
        let grid = grid(
            r#"[[{"name":"browser","command":["firefox"]},{"name":"up"},{"name":"down"},{"name":"reload"}]]"#,
        );
        let mut pager = Pager::new(true);
        assert_eq!(
            pager.on_press(&grid, 0).unwrap(),
            Effect::Launch {
                name: "browser".into(),
                argv: vec!["firefox".into()]
            }
        );
        assert_eq!(
            pager.on_press(&grid, 1).unwrap(),
            Effect::ExternalNavigate(Direction::Up)
        );
        assert_eq!(
            pager.on_press(&grid, 2).unwrap(),
            Effect::ExternalNavigate(Direction::Down)
        );
        assert_eq!(
            pager.on_press(&grid, 3).unwrap(),
            Effect::ReloadAndRerenderAll
        );
        assert_eq!(pager.current_page(), 0);
    }

    #[test]
    fn test_missing_command() {
        let grid = grid(r#"[[{"name":"custom"}]]"#);
        let mut pager = Pager::new(true);
        let err = pager.on_press(&grid, 0).unwrap_err();
        assert!(matches!(
            err,
            DeckError::MissingCommand { ref name, page: 0, key: 0 } if name == "custom"
        ));
    }

    #[test]
    fn test_clamp_after_shrink() {
        let big = nav_grid(3);
        let small = nav_grid(2);
        let mut pager = Pager::new(true);
        pager.on_press(&big, LEFT).unwrap();
        assert_eq!(pager.current_page(), 2);

        // Grid shrank under the cursor: press resolves against the last page
        assert_eq!(pager.on_press(&small, EXIT).unwrap(), Effect::Shutdown);
        assert_eq!(pager.current_page(), 1);

        // In-range cursor is preserved
        pager.clamp(5);
        assert_eq!(pager.current_page(), 1);
    }
}
