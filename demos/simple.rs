use counted_iter::{
    BasicWrappedIterator, CountedIterator, CountedIteratorExt, HeadAdder, JsonArrayIterator, MergeStrategy,
    MergedSortedIterator, Status, TailAdder, WriteOptions, json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Song {
    title: String,
    plays: u64,
}

fn shard(titles: &[(&str, u64)]) -> BasicWrappedIterator<std::vec::IntoIter<Song>> {
    BasicWrappedIterator::from_vec(
        titles
            .iter()
            .map(|(title, plays)| Song {
                title: title.to_string(),
                plays: *plays,
            })
            .collect(),
    )
}

fn main() {
    env_logger::init();
    println!("Counted Iterator Example");

    // Two shards, each sorted by title
    let shards = vec![
        shard(&[("Airbag", 12), ("Creep", 40), ("Lucky", 7)]),
        shard(&[("Bones", 3), ("Nude", 25), ("Reckoner", 31)]),
    ];
    let merged = MergedSortedIterator::new(shards, |a, b| a.title.cmp(&b.title), MergeStrategy::Queue);
    println!("Songs across shards: {:?}", merged.size());

    // Second page of popular songs, with a header and a trailer
    let page = merged.filtered(|s| s.plays >= 10).max_offset().offset(1).max(2).build();
    let page = HeadAdder::builder(page)
        .supplier(|| Ok(Song { title: "-- page 2 --".to_string(), plays: 0 }))
        .build();
    let mut page = TailAdder::builder(page)
        .remember_last()
        .adder(|last| {
            let last = last.ok_or_else(|| Status::illegal_state("empty page"))?;
            Ok(Song {
                title: format!("-- continues after {} --", last.title),
                plays: 0,
            })
        })
        .build()
        .map_counted(Ok::<_, Status>);

    let mut out = Vec::new();
    let written = json::write(&mut page, &mut out, &WriteOptions::default()).expect("Failed to write page");
    println!("Wrote {} songs: {}", written, String::from_utf8_lossy(&out));

    // Read the page back, one element at a time
    let mut songs: JsonArrayIterator<Song, _> = JsonArrayIterator::new(out.as_slice()).expect("Failed to read page");
    println!("Announced size: {:?}", songs.size());
    while let Some(song) = songs.next() {
        match song {
            Ok(song) => println!("  {} ({} plays)", song.title, song.plays),
            Err(e) => println!("  unreadable song: {}", e),
        }
    }
    println!("Read {} songs", songs.yielded());
}
