use skm_model::{
    BuildConfig, CanonicalKmer, CanonicalModel, EncodedSuperKmer, KmerModel, KmerRecord,
    MinimizerModel, Seq, SkmError, SuperKmerError, SuperKmerFile, SuperKmerWriter, Wide,
    build_superkmers_sync, decode_superkmer, encode_superkmer, max_run_len, read_superkmers,
    split_superkmers,
};

type Mini = MinimizerModel<1, CanonicalModel<1>>;

fn scan(seq: &[u8], k: usize, m: usize) -> (Mini, Vec<CanonicalKmer<1>>, Vec<std::ops::Range<usize>>) {
    let model = Mini::new(k, m).unwrap();
    let mut kmers = Vec::new();
    model.build(&Seq::ascii(seq), &mut kmers);
    let runs = split_superkmers(&kmers);
    let bases = kmers.iter().map(|k| *k.base()).collect();
    (model, bases, runs)
}

#[test]
fn test_split_single_run() {
    // Every window of ACGTACGTA shares the folded minimizer ACG.
    let (_, kmers, runs) = scan(b"ACGTACGTA", 5, 3);
    assert_eq!(kmers.len(), 5);
    assert_eq!(runs, vec![0..5]);
}

#[test]
fn test_split_breaks_on_invalid() {
    let model = Mini::new(5, 3).unwrap();
    let mut kmers = Vec::new();
    model.build(&Seq::ascii(b"ACGTACGNACGTACG"), &mut kmers);
    let runs = split_superkmers(&kmers);
    // No run may contain an invalid record.
    for run in &runs {
        assert!(kmers[run.clone()].iter().all(|k| k.is_valid()));
    }
    assert!(runs.len() >= 2);
    // Runs are maximal: adjacent runs never share a minimizer value.
    for pair in runs.windows(2) {
        if pair[0].end == pair[1].start {
            assert_ne!(
                kmers[pair[0].start].minimizer().value(),
                kmers[pair[1].start].minimizer().value()
            );
        }
    }
}

#[test]
fn test_encode_layout() {
    let (_, kmers, runs) = scan(b"ACGTACG", 5, 3);
    assert_eq!(runs, vec![0..3]);
    let packed = encode_superkmer(&kmers).unwrap();

    // Seed is the first forward strand: ACGTA.
    assert_eq!(packed.seed.value(), 0b00_01_11_10_00);
    // Tail holds the last bases of CGTAC and GTACG under the length byte.
    assert_eq!(packed.compacted.value(), (3 << 56) | 0b01_11);
}

#[test]
fn test_codec_round_trip() {
    let (_, kmers, runs) = scan(b"ACGTACGTA", 5, 3);
    assert_eq!(runs, vec![0..5]);
    let packed = encode_superkmer(&kmers).unwrap();

    let mut decoded = Vec::new();
    assert_eq!(decode_superkmer(&packed, 5, &mut decoded), 5);
    assert_eq!(decoded, kmers);
    assert_eq!(
        decoded.iter().map(|k| k.forward().value()).collect::<Vec<_>>(),
        [120, 481, 903, 542, 120]
    );
}

#[test]
fn test_codec_round_trip_multi_sequence() {
    let (model, kmers, runs) = scan(b"CATTGATAGTGGCATTGATAGTGG", 7, 3);
    assert!(!runs.is_empty());
    for run in runs {
        let slice = &kmers[run];
        let packed = encode_superkmer(slice).unwrap();
        let mut decoded = Vec::new();
        decode_superkmer(&packed, model.kmer_size(), &mut decoded);
        assert_eq!(decoded, slice);
    }
}

#[test]
fn test_capacity_limits() {
    assert_eq!(max_run_len::<1>(), 29);
    assert_eq!(max_run_len::<2>(), 61);
    assert_eq!(max_run_len::<4>(), 125);

    let filler = CanonicalKmer::<1>::from_strands(Wide::from_u64(7), Wide::from_u64(9));
    let run = vec![filler; 30];
    assert!(matches!(
        encode_superkmer(&run),
        Err(SuperKmerError::RunTooLong { len: 30, max: 29 })
    ));
    assert!(encode_superkmer(&run[..29]).is_ok());

    let empty: &[CanonicalKmer<1>] = &[];
    assert!(matches!(
        encode_superkmer(empty),
        Err(SuperKmerError::EmptyRun)
    ));
}

#[test]
fn test_sink_save_load() {
    let (_, kmers, _) = scan(b"ACGTACGTA", 5, 3);
    let packed = encode_superkmer(&kmers).unwrap();

    let mut bag: Vec<Wide<1>> = Vec::new();
    packed.save(&mut bag);
    packed.save(&mut bag);
    assert_eq!(bag.len(), 4);

    let mut stream = bag.into_iter();
    assert_eq!(EncodedSuperKmer::load(&mut stream), Some(packed));
    assert_eq!(EncodedSuperKmer::load(&mut stream), Some(packed));
    assert_eq!(EncodedSuperKmer::load(&mut stream), None);
}

#[test]
fn test_skm_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.skm");

    let seqs = [
        b"CATTGATAGTGGCATTGATAGTGG".as_slice(),
        b"ACGTACGTA".as_slice(),
    ];
    let records =
        build_superkmers_sync::<1>(&seqs, 5, &BuildConfig::default().minimizer_size(3)).unwrap();
    assert!(!records.is_empty());

    let mut writer = SuperKmerWriter::<1>::create(&path, 5, 3).unwrap();
    for record in &records {
        writer.push(record).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), records.len() as u64);

    let (header, streamed) = read_superkmers::<1>(&path).unwrap();
    assert_eq!(header.k, 5);
    assert_eq!(header.m, 3);
    assert_eq!(header.limbs, 1);
    assert_eq!(header.n_records, records.len() as u64);
    assert_eq!(streamed, records);

    let file = SuperKmerFile::<1>::open_mmap(&path).unwrap();
    assert_eq!(file.len(), records.len());
    let mapped: Vec<_> = file.iter().unwrap().collect();
    assert_eq!(mapped, records);
}

#[test]
fn test_skm_width_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w1.skm");
    let writer = SuperKmerWriter::<1>::create(&path, 5, 3).unwrap();
    writer.finish().unwrap();

    assert!(matches!(
        read_superkmers::<2>(&path),
        Err(SkmError::Format(_))
    ));
    assert!(matches!(
        SuperKmerFile::<2>::open_mmap(&path),
        Err(SkmError::Format(_))
    ));
}

#[test]
fn test_skm_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.skm");
    std::fs::write(&path, b"definitely not a kmer file, not even close").unwrap();
    assert!(matches!(
        read_superkmers::<1>(&path),
        Err(SkmError::Format(_))
    ));
}

#[test]
fn test_builder_matches_sequential() {
    let seqs: Vec<&[u8]> = vec![
        b"CATTGATAGTGGCATTGATAGTGG".as_slice(),
        b"ACGTACGTA".as_slice(),
        b"TTTT".as_slice(),
        b"GGGGCCCCATATATGGGGCCCC".as_slice(),
    ];
    let cfg = BuildConfig::default().minimizer_size(3).threads(2);
    let parallel = build_superkmers_sync::<1>(&seqs, 5, &cfg).unwrap();

    let mut sequential = Vec::new();
    for seq in &seqs {
        if seq.len() < 5 {
            continue;
        }
        let (_, kmers, runs) = scan(seq, 5, 3);
        for run in runs {
            let mut start = run.start;
            while start < run.end {
                let end = (start + max_run_len::<1>()).min(run.end);
                sequential.push(encode_superkmer(&kmers[start..end]).unwrap());
                start = end;
            }
        }
    }
    assert_eq!(parallel, sequential);
}

#[test]
fn test_builder_skips_short_sequences() {
    let cfg = BuildConfig::default().minimizer_size(3).min_seq_len(100);
    let records = build_superkmers_sync::<1>(&[b"ACGTACGTA".as_slice()], 5, &cfg).unwrap();
    assert!(records.is_empty());
}
