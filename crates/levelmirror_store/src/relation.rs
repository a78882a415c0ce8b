//! Many-to-many relations of a level.

use std::fmt;

/// A collection related to a level through a join table.
///
/// Author, genre and tag rows are keyed by their text value; zip and screen
/// rows by the MD5 of their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Level authors.
    Author,
    /// Level genres.
    Genre,
    /// Level tags.
    Tag,
    /// Downloadable archives.
    ZipFile,
    /// Screenshots.
    Screen,
}

impl Relation {
    /// Every relation, in cleanup order.
    pub const ALL: [Relation; 5] = [
        Relation::Author,
        Relation::Genre,
        Relation::Tag,
        Relation::ZipFile,
        Relation::Screen,
    ];

    pub(crate) fn table(self) -> &'static str {
        match self {
            Relation::Author => "Author",
            Relation::Genre => "Genre",
            Relation::Tag => "Tag",
            Relation::ZipFile => "Zip",
            Relation::Screen => "Picture",
        }
    }

    pub(crate) fn id_column(self) -> &'static str {
        match self {
            Relation::Author => "AuthorID",
            Relation::Genre => "GenreID",
            Relation::Tag => "TagID",
            Relation::ZipFile => "ZipID",
            Relation::Screen => "PictureID",
        }
    }

    pub(crate) fn key_column(self) -> &'static str {
        match self {
            Relation::ZipFile | Relation::Screen => "md5",
            _ => "value",
        }
    }

    pub(crate) fn link_table(self) -> &'static str {
        match self {
            Relation::Author => "AuthorList",
            Relation::Genre => "GenreList",
            Relation::Tag => "TagList",
            Relation::ZipFile => "ZipList",
            Relation::Screen => "Screens",
        }
    }

    pub(crate) fn link_column(self) -> &'static str {
        match self {
            Relation::Author => "authorID",
            Relation::Genre => "genreID",
            Relation::Tag => "tagID",
            Relation::ZipFile => "zipID",
            Relation::Screen => "pictureID",
        }
    }

    /// Returns true if a missing lookup row is created on demand.
    ///
    /// Content rows carry more than their key and must be upserted first.
    pub(crate) fn creates_lookup(self) -> bool {
        matches!(self, Relation::Author | Relation::Genre | Relation::Tag)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
