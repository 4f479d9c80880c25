/// Catppuccin Mocha accents used for CLI output
/// https://catppuccin.com/palette

pub const MAUVE: (u8, u8, u8) = (203, 166, 247);
pub const RED: (u8, u8, u8) = (243, 139, 168);
pub const PEACH: (u8, u8, u8) = (250, 179, 135);
pub const YELLOW: (u8, u8, u8) = (249, 226, 175);
pub const GREEN: (u8, u8, u8) = (166, 227, 161);
pub const SAPPHIRE: (u8, u8, u8) = (116, 199, 236);
pub const BLUE: (u8, u8, u8) = (137, 180, 250);

pub const TEXT: (u8, u8, u8) = (205, 214, 244);
pub const OVERLAY0: (u8, u8, u8) = (108, 112, 134);
