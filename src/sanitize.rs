//! Field-level sanitization of untrusted launcher values.
//!
//! Every value coming out of the protocol parser is checked against a per-key
//! allow-list before it may reach a rendered file or a shell-invocation
//! fragment. The character classes are the minimal sets each field needs;
//! anything outside them rejects the value (that key only, never the whole
//! entry). `Categories` additionally passes through a domain whitelist.

/// The fixed key vocabulary. Keys outside this set never reach an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    GenericName,
    Comment,
    Categories,
    Icon,
    Exec,
}

impl Field {
    /// Vocabulary lookup for a protocol key. Localized keys (carrying a
    /// bracketed qualifier) and unknown keys return `None` and are ignored.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Name" => Some(Self::Name),
            "GenericName" => Some(Self::GenericName),
            "Comment" => Some(Self::Comment),
            "Categories" => Some(Self::Categories),
            "Icon" => Some(Self::Icon),
            "Exec" => Some(Self::Exec),
            _ => None,
        }
    }

    /// Key text as it appears in a `.desktop` file.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::GenericName => "GenericName",
            Self::Comment => "Comment",
            Self::Categories => "Categories",
            Self::Icon => "Icon",
            Self::Exec => "Exec",
        }
    }

    /// Allow-list character class for this field's values.
    fn allows(self, c: char) -> bool {
        match self {
            Self::Name | Self::GenericName | Self::Comment => {
                c.is_ascii_alphanumeric() || "/.,:&()_ +-".contains(c)
            }
            Self::Categories => c.is_ascii_alphanumeric() || "/.;:'() -".contains(c),
            Self::Exec => c.is_ascii_alphanumeric() || "()_&>/{}:.= -".contains(c),
            Self::Icon => c.is_ascii_alphanumeric() || "/_.-".contains(c),
        }
    }
}

/// Validate an untrusted value against its field's allow-list.
///
/// Returns `None` on a pattern mismatch (the caller logs and drops that key).
/// Accepted `Categories` values are additionally filtered against the
/// category whitelist.
pub fn sanitize_value(field: Field, untrusted: &str) -> Option<String> {
    if !untrusted.chars().all(|c| field.allows(c)) {
        return None;
    }
    Some(match field {
        Field::Categories => sanitize_categories(untrusted),
        _ => untrusted.to_string(),
    })
}

/// Filter a `Categories=` value down to whitelisted tokens.
///
/// Tokens are split on ';', trimmed, kept only when whitelisted, and
/// rejoined in their original order with a trailing ';'. Unknown categories
/// disappear silently; they are an expected input shape, not an anomaly.
pub fn sanitize_categories(untrusted: &str) -> String {
    let categories: Vec<&str> = untrusted
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty() && CATEGORIES_WHITELIST.contains(c))
        .collect();

    format!("{};", categories.join(";"))
}

/// Registered application categories of the freedesktop.org menu spec 1.1
/// (main and additional categories; the reserved ones — Screensaver,
/// TrayIcon, Applet, Shell — are deliberately absent).
pub const CATEGORIES_WHITELIST: &[&str] = &[
    // Main categories
    "AudioVideo",
    "Audio",
    "Video",
    "Development",
    "Education",
    "Game",
    "Graphics",
    "Network",
    "Office",
    "Science",
    "Settings",
    "System",
    "Utility",
    // Additional categories
    "Building",
    "Debugger",
    "IDE",
    "GUIDesigner",
    "Profiling",
    "RevisionControl",
    "Translation",
    "Calendar",
    "ContactManagement",
    "Database",
    "Dictionary",
    "Chart",
    "Email",
    "Finance",
    "FlowChart",
    "PDA",
    "ProjectManagement",
    "Presentation",
    "Spreadsheet",
    "WordProcessor",
    "2DGraphics",
    "VectorGraphics",
    "RasterGraphics",
    "3DGraphics",
    "Scanning",
    "OCR",
    "Photography",
    "Publishing",
    "Viewer",
    "TextTools",
    "DesktopSettings",
    "HardwareSettings",
    "Printing",
    "PackageManager",
    "Dialup",
    "InstantMessaging",
    "Chat",
    "IRCClient",
    "Feed",
    "FileTransfer",
    "HamRadio",
    "News",
    "P2P",
    "RemoteAccess",
    "Telephony",
    "TelephonyTools",
    "VideoConference",
    "WebBrowser",
    "WebDevelopment",
    "Midi",
    "Mixer",
    "Sequencer",
    "Tuner",
    "TV",
    "AudioVideoEditing",
    "Player",
    "Recorder",
    "DiscBurning",
    "ActionGame",
    "AdventureGame",
    "ArcadeGame",
    "BoardGame",
    "BlocksGame",
    "CardGame",
    "KidsGame",
    "LogicGame",
    "RolePlaying",
    "Shooter",
    "Simulation",
    "SportsGame",
    "StrategyGame",
    "Art",
    "Construction",
    "Music",
    "Languages",
    "ArtificialIntelligence",
    "Astronomy",
    "Biology",
    "Chemistry",
    "ComputerScience",
    "DataVisualization",
    "Economy",
    "Electricity",
    "Geography",
    "Geology",
    "Geoscience",
    "History",
    "Humanities",
    "ImageProcessing",
    "Literature",
    "Maps",
    "Math",
    "NumericalAnalysis",
    "MedicalSoftware",
    "Physics",
    "Robotics",
    "Spirituality",
    "Sports",
    "ParallelComputing",
    "Amusement",
    "Archiving",
    "Compression",
    "Electronics",
    "Emulator",
    "Engineering",
    "FileTools",
    "FileManager",
    "TerminalEmulator",
    "Filesystem",
    "Monitor",
    "Security",
    "Accessibility",
    "Calculator",
    "Clock",
    "TextEditor",
    "Documentation",
    "Adult",
    "Core",
    "KDE",
    "GNOME",
    "XFCE",
    "GTK",
    "Qt",
    "Motif",
    "Java",
    "ConsoleOnly",
];
