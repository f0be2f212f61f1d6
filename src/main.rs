fn main() -> anyhow::Result<()> {
    haar_weapon_detector::webcam::run()
}
