//! `stats` - library totals for groups with `stats = true`

use anyhow::Result;
use plexkit::{LibrarySection, LibraryType};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use super::{Runtime, Target, insert_slot};
use crate::Context;
use crate::{output, ui};

/// Totals for one server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    /// Movies outside anime sections
    pub hd_movies: u64,
    pub anime_movies: u64,
    pub total_shows: u64,
    pub total_seasons: u64,
    pub total_episodes: u64,
    pub audio_artists: u64,
    pub audio_albums: u64,
    pub audio_tracks: u64,
    pub library_breakdown: BTreeMap<String, SectionCounts>,
}

/// Per-section counts, tagged with the section type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SectionCounts {
    Movie {
        count: u64,
    },
    Show {
        shows: u64,
        seasons: u64,
        episodes: u64,
    },
    Artist {
        artists: u64,
        albums: u64,
        tracks: u64,
    },
}

fn is_anime(title: &str) -> bool {
    title.to_lowercase().contains("anime")
}

impl LibraryStats {
    /// Count one section with `count(kind)`
    ///
    /// Sections of other types (photos, for one) are skipped.
    pub fn add_section<F>(&mut self, section: &LibrarySection, mut count: F) -> plexkit::Result<()>
    where
        F: FnMut(Option<LibraryType>) -> plexkit::Result<u64>,
    {
        let counts = match section.kind.as_str() {
            "movie" => {
                let movies = count(None)?;
                if is_anime(&section.title) {
                    self.anime_movies += movies;
                } else {
                    self.hd_movies += movies;
                }
                SectionCounts::Movie { count: movies }
            }
            "show" => {
                let shows = count(Some(LibraryType::Show))?;
                let seasons = count(Some(LibraryType::Season))?;
                let episodes = count(Some(LibraryType::Episode))?;
                self.total_shows += shows;
                self.total_seasons += seasons;
                self.total_episodes += episodes;
                SectionCounts::Show {
                    shows,
                    seasons,
                    episodes,
                }
            }
            "artist" => {
                let artists = count(Some(LibraryType::Artist))?;
                let albums = count(Some(LibraryType::Album))?;
                let tracks = count(Some(LibraryType::Track))?;
                self.audio_artists += artists;
                self.audio_albums += albums;
                self.audio_tracks += tracks;
                SectionCounts::Artist {
                    artists,
                    albums,
                    tracks,
                }
            }
            other => {
                log::debug!("Skipping section {} of type {other}", section.title);
                return Ok(());
            }
        };

        self.library_breakdown.insert(section.title.clone(), counts);
        Ok(())
    }
}

fn server_stats(runtime: &Runtime, target: &Target<'_>) -> Result<LibraryStats> {
    let server = runtime.media_server(target.server)?;
    let mut stats = LibraryStats::default();
    for section in server.sections()? {
        stats.add_section(&section, |kind| server.count(&section.key, kind))?;
    }
    Ok(stats)
}

pub fn run(ctx: &Context) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let targets: Vec<Target<'_>> = runtime
        .config
        .groups
        .iter()
        .filter(|(_, group)| group.stats)
        .flat_map(|(name, group)| {
            group.servers().map(move |(slot, server)| Target {
                group: name,
                slot,
                server,
            })
        })
        .collect();

    if targets.is_empty() {
        log::warn!("No group has stats = true");
    }

    let results = runtime.each_server(&targets, |target| server_stats(&runtime, target))?;

    let mut groups = Map::new();
    let mut success = true;
    for (target, result) in targets.iter().zip(results) {
        let name = &target.server.name;
        let value = match result {
            Ok(stats) => {
                if !ctx.quiet {
                    ui::success(&format!(
                        "{name}: {} movies, {} shows, {} episodes, {} artists",
                        stats.hd_movies + stats.anime_movies,
                        stats.total_shows,
                        stats.total_episodes,
                        stats.audio_artists
                    ));
                }
                json!({"success": true, "server": name, "stats": stats})
            }
            Err(e) => {
                success = false;
                log::error!("Statistics failed for {name}: {e:#}");
                let mut value = output::error(&e);
                value["server"] = json!(name);
                value
            }
        };
        insert_slot(&mut groups, target, value);
    }

    Ok(json!({
        "success": success,
        "groups": groups,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(key: &str, title: &str, kind: &str) -> LibrarySection {
        LibrarySection {
            key: key.to_string(),
            title: title.to_string(),
            kind: kind.to_string(),
        }
    }

    fn fixed(kind: Option<LibraryType>) -> plexkit::Result<u64> {
        Ok(match kind {
            None => 120,
            Some(LibraryType::Show) => 10,
            Some(LibraryType::Season) => 30,
            Some(LibraryType::Episode) => 400,
            Some(LibraryType::Artist) => 5,
            Some(LibraryType::Album) => 12,
            Some(LibraryType::Track) => 90,
            Some(_) => 0,
        })
    }

    #[test]
    fn test_movies_split_by_anime_title() {
        let mut stats = LibraryStats::default();
        stats.add_section(&section("1", "Movies", "movie"), fixed).unwrap();
        stats.add_section(&section("2", "Anime Movies", "movie"), fixed).unwrap();
        stats.add_section(&section("3", "ANIME", "movie"), fixed).unwrap();

        assert_eq!(stats.hd_movies, 120);
        assert_eq!(stats.anime_movies, 240);
        assert_eq!(
            stats.library_breakdown["Anime Movies"],
            SectionCounts::Movie { count: 120 }
        );
    }

    #[test]
    fn test_shows_and_audio_totals() {
        let mut stats = LibraryStats::default();
        stats.add_section(&section("4", "TV", "show"), fixed).unwrap();
        stats.add_section(&section("5", "Kids TV", "show"), fixed).unwrap();
        stats.add_section(&section("6", "Audiobooks", "artist"), fixed).unwrap();
        stats.add_section(&section("7", "Photos", "photo"), fixed).unwrap();

        assert_eq!(stats.total_shows, 20);
        assert_eq!(stats.total_seasons, 60);
        assert_eq!(stats.total_episodes, 800);
        assert_eq!(stats.audio_artists, 5);
        assert_eq!(stats.audio_albums, 12);
        assert_eq!(stats.audio_tracks, 90);
        assert_eq!(stats.library_breakdown.len(), 3);
        assert!(!stats.library_breakdown.contains_key("Photos"));
    }

    #[test]
    fn test_count_error_propagates() {
        let mut stats = LibraryStats::default();
        let err = stats
            .add_section(&section("1", "Movies", "movie"), |_| {
                Err(plexkit::Error::Timeout("deadline".into()))
            })
            .unwrap_err();
        assert!(matches!(err, plexkit::Error::Timeout(_)));
        assert!(stats.library_breakdown.is_empty());
    }

    #[test]
    fn test_breakdown_serializes_with_type_tag() {
        let value = serde_json::to_value(SectionCounts::Show {
            shows: 1,
            seasons: 2,
            episodes: 3,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "show", "shows": 1, "seasons": 2, "episodes": 3})
        );
    }
}
