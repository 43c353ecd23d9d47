use postboard_core::Postboard;

#[derive(Clone)]
pub struct AppState {
    pub board: Postboard,
}

impl AppState {
    pub fn new(board: Postboard) -> Self {
        Self { board }
    }

    pub fn login_path(&self) -> &str {
        &self.board.config.login_path
    }
}
