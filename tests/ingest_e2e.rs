// End-to-end tests: a synthetic view export in the real grid framing is
// ingested through the public API, persisted, and scored.

use std::collections::HashMap;
use std::io::Cursor;

use fm_scout::config::Config;
use fm_scout::db::Database;
use fm_scout::ingest::interner::Dimension;
use fm_scout::ingest::record::PlayerRecord;
use fm_scout::ingest::IngestSession;
use fm_scout::scoring::ScoringEngine;

// ===========================================================================
// Fixture: a two-player export in the stock 92-column layout
// ===========================================================================

const STAT_HEADERS: [&str; 23] = [
    "Aer A/90",
    "Hdrs W/90",
    "Blk/90",
    "Clr/90",
    "Tck/90",
    "Pres A/90",
    "Pres C/90",
    "Int/90",
    "Sprints/90",
    "Poss Lost/90",
    "Poss Won/90",
    "Drb/90",
    "Op-Crs A/90",
    "Op-Crs C/90",
    "Ps A/90",
    "Ps C/90",
    "Pr Passes/90",
    "Op-KP/90",
    "Ch C/90",
    "xA/90",
    "Shot/90",
    "Sht/90",
    "NP-xG/90",
];

const ATTR_HEADERS: [&str; 47] = [
    "Cor", "Cro", "Dri", "Fin", "Fir", "Fre", "Hea", "Lon", "L Th", "Mar", "Pas", "Pen", "Tck",
    "Tec", "Agg", "Ant", "Bra", "Cmp", "Cnt", "Dec", "Det", "Fla", "Ldr", "OtB", "Pos", "Tea",
    "Vis", "Wor", "Acc", "Agi", "Bal", "Jum", "Nat", "Pac", "Sta", "Str", "Aer", "Cmd", "Com",
    "Ecc", "Han", "Kic", "1v1", "Pun", "Ref", "TRO", "Thr",
];

const CONTRACT_HEADERS: [&str; 6] = [
    "Begins",
    "Expires",
    "Opt Ext by Club",
    "Wage",
    "AP",
    "Min Fee Rls",
];

fn header_cells() -> Vec<String> {
    let mut cells: Vec<String> = Vec::with_capacity(92);
    cells.extend(STAT_HEADERS.iter().map(|h| h.to_string()));
    cells.extend(ATTR_HEADERS.iter().map(|h| h.to_string()));
    cells.extend(CONTRACT_HEADERS.iter().map(|h| h.to_string()));
    // National-team columns sit between contract and rating; no category
    // range claims them, so they are sliced away.
    cells.extend(["Team", "Caps", "Yth Apps"].iter().map(|h| h.to_string()));
    cells.push("CA".to_string());
    cells.extend(["Name", "UID"].iter().map(|h| h.to_string()));
    cells.extend(
        [
            "Age",
            "Position",
            "Right Foot",
            "Left Foot",
            "Mins",
            "Division",
            "Club",
            "Nat",
            "Eligible",
        ]
        .iter()
        .map(|h| h.to_string()),
    );
    cells.push("Height".to_string());
    cells
}

struct FixturePlayer {
    name: &'static str,
    uid: &'static str,
    position: &'static str,
    club: &'static str,
    mins: &'static str,
    stat_base: f64,
}

fn player_cells(p: &FixturePlayer) -> Vec<String> {
    let mut cells: Vec<String> = Vec::with_capacity(92);
    for i in 0..STAT_HEADERS.len() {
        cells.push(format!("{:.2}", p.stat_base + i as f64 * 0.1));
    }
    cells.extend(std::iter::repeat("12".to_string()).take(ATTR_HEADERS.len()));
    // begins, expires, extension, wage, asking price, release clause
    cells.extend(
        [
            "01/07/2023",
            "30/06/2026",
            "",
            "12,500\u{a0}kr",
            "41M\u{a0}kr",
            "-",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    cells.extend(["-", "-", "-"].iter().map(|c| c.to_string()));
    cells.push("142".to_string());
    cells.push(p.name.to_string());
    cells.push(p.uid.to_string());
    cells.extend(
        [
            "24", p.position, "Strong", "Reasonable", p.mins, "Premier", p.club, "ENG", "Yes",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    cells.push("182 cm".to_string());
    cells
}

fn grid_line(cells: &[String]) -> String {
    format!("|{}| | |", cells.join("|"))
}

fn divider() -> String {
    format!("| {}", "-".repeat(240))
}

fn export_text(players: &[FixturePlayer]) -> String {
    let mut out = String::new();
    for _ in 0..8 {
        out.push_str("exported view\n");
    }
    out.push_str(&grid_line(&header_cells()));
    out.push('\n');
    out.push_str(&divider());
    out.push('\n');
    for player in players {
        out.push_str(&grid_line(&player_cells(player)));
        out.push('\n');
        out.push_str(&divider());
        out.push('\n');
    }
    out
}

fn fixture_players() -> Vec<FixturePlayer> {
    vec![
        FixturePlayer {
            name: "Ada Striker",
            uid: "1001",
            position: "M/AM (LC)",
            club: "FC Test",
            mins: "2,340",
            stat_base: 2.0,
        },
        FixturePlayer {
            name: "Bo Holder",
            uid: "1002",
            position: "M (C)",
            club: "AIK",
            mins: "1,800",
            stat_base: 1.0,
        },
    ]
}

fn ingest_fixture(session: &mut IngestSession, players: &[FixturePlayer]) -> Vec<PlayerRecord> {
    let layout = Config::default().export_layout();
    let text = export_text(players);
    session
        .stream(Cursor::new(text), &layout)
        .expect("stream should open")
        .collect::<Result<Vec<_>, _>>()
        .expect("every fixture record should normalize")
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn full_export_normalizes_into_typed_records() {
    let mut session = IngestSession::new(27, Default::default(), 2);
    let records = ingest_fixture(&mut session, &fixture_players());
    assert_eq!(records.len(), 2);

    let ada = &records[0];
    assert_eq!(ada.id, 0);
    assert_eq!(ada.identity.name, "Ada Striker");
    assert_eq!(ada.identity.season, 27);

    // "M/AM (LC)" fans out to four independent profiles.
    let positions: Vec<&str> = ada.profiles.iter().map(|p| p.position.as_str()).collect();
    assert_eq!(positions, ["ML", "MC", "AML", "AMC"]);
    assert!(ada.profiles.iter().all(|p| p.mins == 2340));

    // Stat columns land in declaration order.
    assert_eq!(ada.stats.aer_a, 2.0);
    assert!((ada.stats.np_xg - 4.2).abs() < 1e-9);

    // Contract sentinels and obfuscation.
    assert_eq!(ada.contract.begin_date, 2023);
    assert_eq!(ada.contract.expiry_date, 2026);
    assert_eq!(ada.contract.wage, 12_500);
    assert_eq!(ada.contract.release_clause, 0);
    assert!((20_500_000..=82_000_000).contains(&ada.contract.value));

    // First record carries the whole lookup delta; the second only its new
    // club.
    assert_eq!(ada.new_lookups.len(), 3);
    let bo = &records[1];
    assert_eq!(bo.id, 1);
    assert_eq!(bo.new_lookups.len(), 1);
    assert_eq!(bo.new_lookups[0].dimension, Dimension::Club);
    assert_eq!(bo.new_lookups[0].value, "AIK");
    assert_eq!(
        bo.profiles[0].division,
        ada.profiles[0].division,
        "shared division value must reuse its interned id"
    );
}

#[test]
fn ingest_persist_and_score_round_trip() {
    let mut session = IngestSession::new(27, Default::default(), 2);
    let records = ingest_fixture(&mut session, &fixture_players());

    let db = Database::open(":memory:").unwrap();
    for record in &records {
        db.insert_record(record).unwrap();
    }

    let stats: Vec<String> = ["xa", "shot", "np_xg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let population = db.select_population("MC", 450, &stats).unwrap();
    assert_eq!(population.len(), 2, "both fixture players play MC");

    let vectors: Vec<Vec<f64>> = population.iter().map(|(_, v)| v.clone()).collect();
    let engine = ScoringEngine::fit(stats, &vectors).unwrap();

    let mut cards = HashMap::new();
    for (name, values) in &population {
        cards.insert(name.clone(), engine.score(values).unwrap());
    }

    let ada = &cards["Ada Striker"];
    let bo = &cards["Bo Holder"];
    for card in [ada, bo] {
        for score in &card.per_stat {
            assert!(*score > -10.0 && *score < 10.0);
        }
    }
    // Ada's stat line dominates Bo's, so her aggregate must rank first, and
    // the two-player population is symmetric around its mean.
    assert!(ada.aggregate > bo.aggregate);
    assert!((ada.aggregate + bo.aggregate).abs() < 1e-9);
}

#[test]
fn second_batch_merges_without_id_collisions() {
    let db = Database::open(":memory:").unwrap();

    let mut first = IngestSession::new(27, Default::default(), 2);
    for record in ingest_fixture(&mut first, &fixture_players()) {
        db.insert_record(&record).unwrap();
    }

    // A later, independent run: offsets continue from the store, known
    // values keep their ids, and new values never collide.
    let mut second = IngestSession::new(28, db.next_lookup_offsets().unwrap(), 2)
        .with_next_player_id(db.next_player_id().unwrap());
    db.load_lookups(second.interner_mut()).unwrap();

    let newcomers = vec![
        FixturePlayer {
            name: "Cy Keeper",
            uid: "1003",
            position: "GK",
            club: "FC Test",
            mins: "2,700",
            stat_base: 0.0,
        },
        FixturePlayer {
            name: "Dee Winger",
            uid: "1004",
            position: "AM (RL)",
            club: "Hammarby",
            mins: "2,100",
            stat_base: 3.0,
        },
    ];
    let records = ingest_fixture(&mut second, &newcomers);

    // "FC Test" keeps the id the first run stored for it; only "Hammarby"
    // is fresh, and its id continues past both stored clubs.
    assert_eq!(records[0].profiles[0].club, 0);
    assert!(records[0].new_lookups.is_empty());
    assert_eq!(records[1].new_lookups.len(), 1);
    assert_eq!(records[1].new_lookups[0].value, "Hammarby");
    assert_eq!(records[1].new_lookups[0].id, 2);
}

#[test]
fn malformed_cell_fails_only_that_record() {
    let mut players = fixture_players();
    players[1].mins = "unknown";
    let layout = Config::default().export_layout();
    let text = export_text(&players);

    let mut session = IngestSession::new(27, Default::default(), 2);
    let results: Vec<_> = session
        .stream(Cursor::new(text), &layout)
        .unwrap()
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("mins"));
}
