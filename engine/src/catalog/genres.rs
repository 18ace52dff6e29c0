//! Fixed vocabularies of the movie catalog.

/// Genre names exactly as the catalog spells them
pub const GENRE_NAMES: &[&str] = &[
    "аниме",
    "биография",
    "боевик",
    "вестерн",
    "военный",
    "детектив",
    "детский",
    "для взрослых",
    "документальный",
    "драма",
    "игра",
    "история",
    "комедия",
    "концерт",
    "короткометражка",
    "криминал",
    "мелодрама",
    "музыка",
    "мультфильм",
    "мюзикл",
    "новости",
    "приключения",
    "реальное ТВ",
    "семейный",
    "спорт",
    "ток-шоу",
    "триллер",
    "ужасы",
    "фантастика",
    "фильм-нуар",
    "фэнтези",
    "церемония",
];

/// English spellings users and models commonly produce, mapped to catalog names
const GENRE_ALIASES: &[(&str, &str)] = &[
    ("action", "боевик"),
    ("adult", "для взрослых"),
    ("adventure", "приключения"),
    ("animation", "мультфильм"),
    ("anime", "аниме"),
    ("biography", "биография"),
    ("cartoon", "мультфильм"),
    ("ceremony", "церемония"),
    ("comedy", "комедия"),
    ("concert", "концерт"),
    ("crime", "криминал"),
    ("detective", "детектив"),
    ("documentary", "документальный"),
    ("drama", "драма"),
    ("family", "семейный"),
    ("fantasy", "фэнтези"),
    ("film-noir", "фильм-нуар"),
    ("film noir", "фильм-нуар"),
    ("game", "игра"),
    ("history", "история"),
    ("horror", "ужасы"),
    ("kids", "детский"),
    ("melodrama", "мелодрама"),
    ("music", "музыка"),
    ("musical", "мюзикл"),
    ("mystery", "детектив"),
    ("news", "новости"),
    ("noir", "фильм-нуар"),
    ("reality", "реальное ТВ"),
    ("reality-tv", "реальное ТВ"),
    ("romance", "мелодрама"),
    ("sci-fi", "фантастика"),
    ("science fiction", "фантастика"),
    ("short", "короткометражка"),
    ("sport", "спорт"),
    ("talk-show", "ток-шоу"),
    ("thriller", "триллер"),
    ("war", "военный"),
    ("western", "вестерн"),
];

/// Item types the catalog distinguishes
pub const ITEM_TYPES: &[&str] = &["animated-series", "anime", "cartoon", "movie", "tv-series"];

/// Item types searched when the question does not narrow it down
pub const DEFAULT_ITEM_TYPES: &[&str] = &["movie", "tv-series"];

/// Map a genre name, in catalog spelling or a known English alias, to the
/// catalog's own spelling. Case and surrounding whitespace are ignored.
pub fn canonical_genre(name: &str) -> Option<&'static str> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    GENRE_NAMES
        .iter()
        .find(|g| g.to_lowercase() == needle)
        .copied()
        .or_else(|| {
            GENRE_ALIASES
                .iter()
                .find(|(alias, _)| *alias == needle)
                .map(|(_, genre)| *genre)
        })
}

pub fn is_item_type(value: &str) -> bool {
    ITEM_TYPES.contains(&value.trim())
}
