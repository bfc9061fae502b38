use fault_dfa::capture::format_blocks;
use fault_dfa::prelude::*;

const AES_KEY: &str = "bf05bd81f5497eef74dae9478eead746";
const AES_PLAINTEXT: &str = "000102030405060708090a0b0c0d0e0f";
const DES_KEY: &str = "1C8529CEA240AE4F";
const DES_PLAINTEXT: &str = "0102030405060708";

fn campaign(kind: CipherKind, key: &str, plaintext: &str) -> FaultCampaign {
    let key = Block::parse(kind, key).unwrap();
    let plaintext = Block::parse(kind, plaintext).unwrap();
    FaultCampaign::new(kind, &key, &plaintext).unwrap()
}

fn faults(descriptors: &[String]) -> Vec<FaultType> {
    descriptors
        .iter()
        .map(|descriptor| get_fault_from(descriptor).unwrap())
        .collect()
}

#[test]
/// AES round 10 key recovery from simulated faults
///
/// Eight byte faults before the round 9 SubBytes step, two per diagonal,
/// recover the round 10 key of the simulated key.
fn recover_aes_round_key_from_simulation() {
    let campaign = campaign(CipherKind::Aes, AES_KEY, AES_PLAINTEXT);
    let descriptors: Vec<String> = (0..8)
        .map(|i| format!("aesbyte_r9_{}_{:02x}", i % 4, i + 1))
        .collect();
    let outputs = campaign.run(&faults(&descriptors)).unwrap();

    let recovery = recover_round_key(CipherKind::Aes, &campaign.reference(), &outputs, 4).unwrap();
    assert_eq!(
        recovery.round_key.to_string(),
        "7B5C10EF978D9E3B20CAE1C22F14CCF7"
    );
    assert_eq!(recovery.stats.accepted, 8);
}

#[test]
/// DES master key recovery from simulated faults
///
/// All 32 bit flips of R after round 15 give the round 16 key, which is
/// reduced to the master key with the known plaintext.
fn recover_des_master_key_from_simulation() {
    let campaign = campaign(CipherKind::Des, DES_KEY, DES_PLAINTEXT);
    let outputs = campaign
        .run(&faults(&get_fault_list(CipherKind::Des)))
        .unwrap();
    assert_eq!(outputs.len(), 32);

    let recovery = recover_round_key(CipherKind::Des, &campaign.reference(), &outputs, 2).unwrap();
    assert_eq!(recovery.round_key, RoundKey::Des(0x2401_17D2_6D2B));

    let RoundKey::Des(round_key) = recovery.round_key else {
        panic!("expected a DES round key");
    };
    let plaintext = Block::parse(CipherKind::Des, DES_PLAINTEXT).unwrap();
    let master = recover_initial_des_key(
        round_key,
        plaintext.as_des().unwrap(),
        campaign.reference().as_des().unwrap(),
    )
    .unwrap();
    assert_eq!(format!("{:016X}", master), DES_KEY);
}

#[test]
/// Captured outputs survive the capture file format
///
/// Simulated outputs written with descriptor comments are read back and
/// still recover the key. Faults that never reach a single diagonal are
/// dropped without failing the run.
fn capture_file_round_trip() {
    let campaign = campaign(CipherKind::Aes, AES_KEY, AES_PLAINTEXT);
    let mut descriptors: Vec<String> = (0..8)
        .map(|i| format!("aesbyte_r9_{}_{:02x}", 4 * (i % 4) + i / 4, 0x21 + i))
        .collect();
    descriptors.push("aesbyte_r8_0_01".to_string());
    let outputs = campaign.run(&faults(&descriptors)).unwrap();

    let text = format!(
        "# reference: {}\n{}",
        campaign.reference(),
        format_blocks(outputs.iter().zip(descriptors).map(|(o, d)| (o, Some(d))))
    );
    let loaded = parse_blocks(&text, CipherKind::Aes).unwrap();
    assert_eq!(loaded, outputs);

    let recovery = recover_round_key(CipherKind::Aes, &campaign.reference(), &loaded, 1).unwrap();
    assert_eq!(
        recovery.round_key.to_string(),
        "7B5C10EF978D9E3B20CAE1C22F14CCF7"
    );
    assert_eq!(recovery.stats.rejected, 1);
}

#[test]
/// Width checks on the block level entry point
fn wrong_width_faults_are_malformed() {
    let reference = Block::parse(CipherKind::Des, "BB1D3957EF45B0C5").unwrap();
    assert!(matches!(
        Block::parse(CipherKind::Des, "BB1D3957EF45B0C5AA"),
        Err(DfaError::MalformedInput(_))
    ));
    assert!(matches!(
        recover_round_key(CipherKind::Aes, &reference, &[reference], 1),
        Err(DfaError::MalformedInput(_))
    ));
}
