mod suite {
    mod initialize;
    mod progress_notification;
}
