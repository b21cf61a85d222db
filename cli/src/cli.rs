use clap::Parser;

#[derive(Parser, Clone)]
#[clap(author, version, long_about = None)]
#[clap(about = "A CLI workbench for building and translating through a constructed language's writing system")]
#[clap(propagate_version = true)]
pub struct Args {
    /// Path to the JSON store file; created on first write if missing.
    #[clap(short, long, value_parser, default_value_t = String::from("etymolog.json"))]
    pub db: String,

    /// Output file; defaults to stdout if unspecified
    #[clap(short, long, value_parser)]
    pub output: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logging entirely
    #[clap(short, long)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Clone)]
pub enum Commands {
    /// Glyph operations: the drawable symbols graphemes are built from
    Glyph {
        #[clap(subcommand)]
        command: GlyphCommand,
    },
    /// Grapheme operations: ordered glyph compositions carrying phonemes
    Grapheme {
        #[clap(subcommand)]
        command: GraphemeCommand,
    },
    /// Phoneme operations on an existing grapheme
    Phoneme {
        #[clap(subcommand)]
        command: PhonemeCommand,
    },
    /// Lexicon operations: the dictionary of native/borrowed words
    Lexicon {
        #[clap(subcommand)]
        command: LexiconCommand,
    },
    /// Ancestry operations: derivation/borrowing relationships between lexicon entries
    Ancestry {
        #[clap(subcommand)]
        command: AncestryCommand,
    },
    /// Translate a phrase into the writing system
    Translate {
        /// The source-language phrase to translate
        phrase: String,
    },
    /// Settings operations
    Settings {
        #[clap(subcommand)]
        command: SettingsCommand,
    },
    /// Store maintenance: status, export, import, clear, reset
    Db {
        #[clap(subcommand)]
        command: DbCommand,
    },
}

#[derive(clap::Subcommand, Clone)]
pub enum GlyphCommand {
    /// Create a new glyph
    Add {
        name: String,
        /// Opaque SVG payload; rendering it is out of scope here
        #[clap(long, default_value_t = String::new())]
        svg: String,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        notes: Option<String>,
    },
    /// List every glyph, with composition usage counts
    List,
    /// Show one glyph by id
    Show { id: i64 },
    /// Search glyphs by name substring
    Search { query: String },
    /// Rename or update a glyph
    Update {
        id: i64,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        svg: Option<String>,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        notes: Option<String>,
    },
    /// Delete a glyph; fails if it is still used by a grapheme
    Rm { id: i64 },
    /// Unlink from every grapheme (deleting any left without glyphs), then delete
    ForceRm { id: i64 },
    /// Delete every dependent grapheme first, then the glyph
    CascadeRm { id: i64 },
}

#[derive(clap::Subcommand, Clone)]
pub enum GraphemeCommand {
    /// Create a grapheme from one or more existing glyph ids
    Add {
        name: String,
        /// Glyph ids composing this grapheme, in order
        #[clap(long = "glyph", required = true)]
        glyphs: Vec<i64>,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        notes: Option<String>,
        /// IPA phonemes to attach, e.g. --phoneme a --phoneme aa
        #[clap(long = "phoneme")]
        phonemes: Vec<String>,
    },
    /// List every grapheme (plain, without composition/phonemes)
    List,
    /// Show one grapheme with its full glyph composition and phonemes
    Show { id: i64 },
    /// Search graphemes by name substring
    Search { query: String },
    /// Rename or update a grapheme
    Update {
        id: i64,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        notes: Option<String>,
    },
    /// Replace a grapheme's glyph composition
    SetGlyphs {
        id: i64,
        #[clap(long = "glyph", required = true)]
        glyphs: Vec<i64>,
    },
    /// Delete a grapheme; fails if referenced by any lexicon entry's spelling
    Rm { id: i64 },
}

#[derive(clap::Subcommand, Clone)]
pub enum PhonemeCommand {
    /// Attach a phoneme to a grapheme
    Add {
        grapheme_id: i64,
        phoneme: String,
        #[clap(long, default_value_t = true)]
        auto_spelling: bool,
        #[clap(long)]
        context: Option<String>,
    },
    /// List every phoneme attached to a grapheme
    List { grapheme_id: i64 },
    /// Delete a phoneme by id
    Rm { id: i64 },
}

#[derive(clap::Subcommand, Clone)]
pub enum LexiconCommand {
    /// Create a lexicon entry
    Add {
        lemma: String,
        #[clap(long)]
        pronunciation: Option<String>,
        #[clap(long)]
        meaning: Option<String>,
        #[clap(long = "pos")]
        part_of_speech: Option<String>,
        #[clap(long)]
        notes: Option<String>,
        #[clap(long)]
        borrowed: bool,
        /// Auto-spell from pronunciation immediately after creation
        #[clap(long)]
        auto_spell: bool,
    },
    /// List every lexicon entry
    List,
    /// Show one lexicon entry
    Show { id: i64 },
    /// Search lexicon entries by lemma/meaning/pronunciation substring
    Search { query: String },
    /// Run the strict auto-spell matcher against an entry's pronunciation and persist it
    Spell { id: i64 },
    /// Preview the fallback auto-spell matcher without persisting anything
    PreviewSpell { pronunciation: String },
    /// Delete a lexicon entry and its ancestry edges
    Rm { id: i64 },
}

#[derive(clap::Subcommand, Clone)]
pub enum AncestryCommand {
    /// Record that `id` derives from `ancestor`
    Add {
        id: i64,
        ancestor: i64,
        #[clap(long, default_value_t = 0)]
        position: i32,
        #[clap(long, default_value = "derived")]
        kind: String,
    },
    /// Remove an ancestry edge
    Rm { id: i64, ancestor: i64 },
    /// Print the materialized ancestry tree rooted at an entry
    Tree {
        id: i64,
        #[clap(long, default_value_t = 50)]
        max_depth: u32,
    },
}

#[derive(clap::Subcommand, Clone)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Merge a TOML file of settings into the current configuration
    Set { file: String },
    /// Restore default settings
    Reset,
}

#[derive(clap::Subcommand, Clone)]
pub enum DbCommand {
    /// Print store status: initialization, row counts, last persisted tick
    Status,
    /// Re-write the store file from the current in-memory state
    Export,
    /// Replace the store from an exported JSON file
    Import { file: String },
    /// Truncate every table, preserving schema
    Clear,
    /// Drop and recreate the store entirely
    Reset,
}
