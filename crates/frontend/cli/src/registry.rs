use tile_core::Game;

/// Game names accepted on the command line
pub const GAMES: [&str; 5] = ["puzzle", "clicker", "parallax", "bounce", "platformer"];

/// Fresh instance of the named game
pub fn create(name: &str) -> Option<Box<dyn Game>> {
    let game: Box<dyn Game> = match name {
        "puzzle" => Box::new(tile_puzzle::Puzzle::new()),
        "clicker" => Box::new(tile_clicker::Clicker::new()),
        "parallax" => Box::new(tile_parallax::Parallax::new()),
        "bounce" => Box::new(tile_bounce::Bounce::new()),
        "platformer" => Box::new(tile_platformer::Platformer::new()),
        _ => return None,
    };
    Some(game)
}
