mod common;

use assert_matches::assert_matches;
use common::*;
use tallworld_common::{ColumnCoord, CubeCoord, TallWorldError};
use tallworld_world::{ConnectionState, LevelMetadata, SaveStep, WorldHandle};
use tokio::task::spawn_blocking;

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_cube_is_empty_not_an_error() {
    let server = start_mock_server().await;
    let config = server.config();
    let (_guard, dir) = temp_world("missing");

    let (generated, column_missing, nonzero) = spawn_blocking(move || {
        let mut world = WorldHandle::open(&dir, config).unwrap();
        let cube = world.get_cube(-7, -4, -6).unwrap();
        let generated = cube.is_generated();
        let nonzero = cube.blocks().iter().any(|&b| b != 0) || cube.sky_light().iter().any(|&l| l != 0);
        let column_missing = world.get_column(-7, -6).unwrap().is_none();
        world.close().unwrap();
        (generated, column_missing, nonzero)
    })
    .await
    .unwrap();

    assert!(!generated);
    assert!(column_missing);
    assert!(!nonzero);
    server.wait_for_disconnects(1).await;
    // one column and one cube request, then the disconnect byte
    assert_eq!(server.opcodes(), vec![0x05, 0x04, 0x00]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_is_lazy() {
    let server = start_mock_server().await;
    let config = server.config();
    let (_guard, dir) = temp_world("lazy");

    let state = spawn_blocking(move || {
        let world = WorldHandle::open(&dir, config).unwrap();
        let state = world.state();
        world.close().unwrap();
        state
    })
    .await
    .unwrap();

    assert_eq!(state, ConnectionState::Unconnected);
    assert_eq!(server.accepts(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_saved_cube_reads_back_in_a_new_session() {
    let server = start_mock_server().await;
    let config = server.config();
    let (_guard, dir) = temp_world("roundtrip");

    let (steps, second_pass) = spawn_blocking({
        let config = config.clone();
        let dir = dir.clone();
        move || {
            let mut world = WorldHandle::open(&dir, config).unwrap();
            let cube = world.get_cube(1, 2, 3).unwrap();
            cube.set_block(0, 0, 0, 1);
            cube.set_block(15, 15, 15, 1000);
            cube.set_block_data(15, 15, 15, 7);
            cube.sky_light_mut()[10] = 15;
            let steps: Vec<SaveStep> = world.save_in_place().collect::<Result<_, _>>().unwrap();
            let second_pass = world.save_in_place().count();
            world.close().unwrap();
            (steps, second_pass)
        }
    })
    .await
    .unwrap();

    assert_eq!(steps, vec![SaveStep::Cube(CubeCoord::new(1, 2, 3))]);
    assert_eq!(second_pass, 0);
    server.wait_for_disconnects(1).await;
    let saves = server.opcodes().iter().filter(|&&op| op == 0x08).count();
    assert_eq!(saves, 1);

    let (block, high, data, light, height) = spawn_blocking(move || {
        let mut world = WorldHandle::open(&dir, config).unwrap();
        let cube = world.get_cube(1, 2, 3).unwrap();
        let result = (
            cube.block(0, 0, 0),
            cube.block(15, 15, 15),
            cube.block_data(15, 15, 15),
            cube.sky_light()[10],
            cube.height_map()[0],
        );
        assert!(cube.is_generated());
        assert!(!cube.is_dirty());
        world.close().unwrap();
        result
    })
    .await
    .unwrap();

    assert_eq!((block, high, data, light), (1, 1000, 7, 15));
    // stone at the bottom of column (0, 0)
    assert_eq!(height, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enumeration_and_membership() {
    let server = start_mock_server().await;
    let config = server.config();
    let (_guard, dir) = temp_world("enumerate");
    let coords = [CubeCoord::new(0, 0, 0), CubeCoord::new(0, 5, 0), CubeCoord::new(-3, 1, 8)];

    spawn_blocking({
        let config = config.clone();
        let dir = dir.clone();
        move || {
            let mut world = WorldHandle::open(&dir, config).unwrap();
            for coord in coords {
                world.get_cube(coord.cx, coord.cy, coord.cz).unwrap().set_block(1, 1, 1, 1);
            }
            assert_eq!(world.save_in_place().run().unwrap(), 3);
            world.close().unwrap();
        }
    })
    .await
    .unwrap();

    server.wait_for_disconnects(1).await;
    let listings_before = server.opcodes().len();
    spawn_blocking(move || {
        let mut world = WorldHandle::open(&dir, config).unwrap();
        let listed = world.cube_coordinates().unwrap().clone();
        assert_eq!(listed.len(), 3);
        for coord in &listed {
            assert!(coords.contains(coord));
            assert!(world.contains_cube(*coord).unwrap());
            assert!(world.get_cube(coord.cx, coord.cy, coord.cz).unwrap().is_generated());
        }
        assert!(!world.contains_cube(CubeCoord::new(0, 1, 0)).unwrap());
        assert!(!world.contains_column(ColumnCoord::new(0, 0)).unwrap());
        world.close().unwrap();
    })
    .await
    .unwrap();

    server.wait_for_disconnects(2).await;
    let opcodes = server.opcodes();
    let session = &opcodes[listings_before..];
    assert_eq!(session.iter().filter(|&&op| op == 0x06).count(), 1);
    assert_eq!(session.iter().filter(|&&op| op == 0x07).count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_closing_fails_the_world() {
    let server = start_mock_server().await;
    server.state.lock().unwrap().closing = true;
    let config = server.config();
    let (_guard, dir) = temp_world("closing");

    spawn_blocking(move || {
        let mut world = WorldHandle::open(&dir, config).unwrap();
        assert_matches!(world.get_cube(0, 0, 0), Err(TallWorldError::ServerClosing));
        assert_eq!(world.state(), ConnectionState::Failed);
        assert_matches!(world.get_cube(0, 0, 0), Err(TallWorldError::WorldClosed));
        assert_matches!(world.cube_coordinates(), Err(TallWorldError::WorldClosed));
        let _ = world.close();
    })
    .await
    .unwrap();

    server.wait_for_disconnects(1).await;
    // nothing is sent after the closing packet except the disconnect byte
    assert_eq!(server.opcodes(), vec![0x05, 0x00]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_writes_level_metadata_last() {
    let server = start_mock_server().await;
    let config = server.config();
    let (_guard, dir) = temp_world("metadata");

    let steps = spawn_blocking({
        let dir = dir.clone();
        move || {
            LevelMetadata::create(&dir, Some(99), Some(1)).unwrap();
            let level = dir.join("level.dat");
            let mut world = WorldHandle::open(&dir, config).unwrap();
            world.get_cube(2, 0, 2).unwrap().set_block(0, 0, 0, 4);
            std::fs::remove_file(&level).unwrap();
            let steps: Vec<SaveStep> = world.save_in_place().collect::<Result<_, _>>().unwrap();
            assert!(level.is_file());
            world.close().unwrap();
            steps
        }
    })
    .await
    .unwrap();

    assert_eq!(
        steps,
        vec![SaveStep::Cube(CubeCoord::new(2, 0, 2)), SaveStep::Metadata]
    );
    let mut metadata = LevelMetadata::load_readonly(&dir).unwrap();
    assert_eq!(metadata.random_seed(), 99);
}
